//! GS1/GS2: positive-spanning-set sampling schemes.
//!
//! Directions are walked from a start point until some constraint is
//! violated; a bisection back toward the analytic center then lands on the
//! boundary, where every active nonlinear constraint is linearized. GS1
//! starts at the center and uses coordinate directions; GS2 starts at the
//! NLP point and derives its directions from a fixing hyperplane. Every
//! direction is attempted together with its opposite, closed by a diagonal
//! pair through the most tightly bounded variable.

use oa_core::{is_active_at, violates_ub, FunctionType, Relaxation};

use super::{RootCutGenerator, SchemeTag};
use crate::linearize::linear_at;

impl RootCutGenerator<'_> {
    /// GS1: coordinate directions from the analytic center.
    pub(crate) fn root_lin_gen_scheme1(&mut self, rel: &mut Relaxation) {
        let Some(sol_c) = self.sol_c.clone() else {
            return;
        };
        let mut x_out = sol_c.clone();

        // Most tightly bounded variables seed the closing diagonal pair.
        let mut l_pos = 0usize;
        let mut u_pos = 0usize;
        let mut v_lb = f64::INFINITY;
        let mut v_ub = f64::INFINITY;

        for i in 0..self.var_ptrs.len() {
            let v_idx = self.var_ptrs[i];
            let (lb, ub) = {
                let v = self.minlp.var(v_idx);
                (v.lb, v.ub)
            };
            if ub - sol_c[v_idx] < v_ub {
                u_pos = i;
                v_ub = ub - sol_c[v_idx];
            }
            if sol_c[v_idx] - lb < v_lb {
                l_pos = i;
                v_lb = sol_c[v_idx] - lb;
            }

            self.search(rel, &[(v_idx, 1.0)], v_idx, ub, &mut x_out, SchemeTag::Gs1);
            x_out[v_idx] = sol_c[v_idx];
            self.search(rel, &[(v_idx, -1.0)], v_idx, lb, &mut x_out, SchemeTag::Gs1);
            x_out[v_idx] = sol_c[v_idx];
        }

        // Diagonal pair through the tightest bounds.
        let down: Vec<(usize, f64)> = self.var_ptrs.iter().map(|&v| (v, -1.0)).collect();
        let bounding = self.var_ptrs[l_pos];
        let bound = self.minlp.var(bounding).lb;
        x_out.copy_from_slice(&sol_c);
        self.search(rel, &down, bounding, bound, &mut x_out, SchemeTag::Gs1);

        let up: Vec<(usize, f64)> = self.var_ptrs.iter().map(|&v| (v, 1.0)).collect();
        let bounding = self.var_ptrs[u_pos];
        let bound = self.minlp.var(bounding).ub;
        x_out.copy_from_slice(&sol_c);
        self.search(rel, &up, bounding, bound, &mut x_out, SchemeTag::Gs1);
    }

    /// GS2: directions derived from a fixing hyperplane through the NLP
    /// point, walked from the NLP point.
    pub(crate) fn root_lin_gen_scheme2(&mut self, rel: &mut Relaxation) {
        let Some(sol_c) = self.sol_c.clone() else {
            return;
        };
        let nlpx = self.nlpx.clone();
        let mut x_out = nlpx.clone();

        // Hyperplane nlpx . (solC - nlpx) fixes one coordinate direction.
        let mut rhs = 0.0;
        let mut fix_idx = None;
        for &v in &self.var_ptrs {
            rhs += nlpx[v] * (sol_c[v] - nlpx[v]);
            if fix_idx.is_none() && sol_c[v] != nlpx[v] {
                fix_idx = Some(v);
            }
        }
        let Some(fix_idx) = fix_idx else {
            log::debug!("center coincides with the NLP point, skipping GS2");
            return;
        };
        if rhs == 0.0 {
            rhs = 1.0;
        }
        let fix_coeff = rhs / (sol_c[fix_idx] - nlpx[fix_idx]);

        let mut last_dir = vec![0.0; self.var_ptrs.len()];
        let fix_pos = self.var_ptrs.iter().position(|&v| v == fix_idx);

        for i in 0..self.var_ptrs.len() {
            let v_idx = self.var_ptrs[i];
            if v_idx == fix_idx {
                continue;
            }
            if v_idx < fix_idx {
                // zero coefficient in the hyperplane: plain coordinate pair
                last_dir[i] = -1.0;
                let (lb, ub) = {
                    let v = self.minlp.var(v_idx);
                    (v.lb, v.ub)
                };
                self.search(rel, &[(v_idx, 1.0)], v_idx, ub, &mut x_out, SchemeTag::Gs2);
                x_out.copy_from_slice(&nlpx);
                self.search(rel, &[(v_idx, -1.0)], v_idx, lb, &mut x_out, SchemeTag::Gs2);
            } else {
                // move v and the fixed variable against their hyperplane
                // coefficients
                let coeff = rhs / (sol_c[v_idx] - nlpx[v_idx]);
                last_dir[i] = -coeff;
                if let Some(fp) = fix_pos {
                    last_dir[fp] += fix_coeff;
                }

                let dir = [(v_idx, coeff.signum()), (fix_idx, -fix_coeff.signum())];
                let (bounding, bound) = self.bounding_of_pair(&dir, &nlpx);
                self.search(rel, &dir, bounding, bound, &mut x_out, SchemeTag::Gs2);
                x_out.copy_from_slice(&nlpx);

                let opp = [(v_idx, -coeff.signum()), (fix_idx, fix_coeff.signum())];
                let (bounding, bound) = self.bounding_of_pair(&opp, &nlpx);
                self.search(rel, &opp, bounding, bound, &mut x_out, SchemeTag::Gs2);
            }
            x_out.copy_from_slice(&nlpx);
        }

        // Closing diagonal pair from the accumulated direction.
        for flip in [1.0, -1.0] {
            let dir: Vec<(usize, f64)> = self
                .var_ptrs
                .iter()
                .zip(&last_dir)
                .map(|(&v, &d)| (v, if flip * d < 0.0 { -1.0 } else { 1.0 }))
                .collect();
            let (bounding, bound) = self.bounding_of_many(&dir, &nlpx);
            x_out.copy_from_slice(&nlpx);
            self.search(rel, &dir, bounding, bound, &mut x_out, SchemeTag::Gs2);
        }
    }

    /// Which of two moving variables hits its bound first.
    fn bounding_of_pair(&self, dir: &[(usize, f64)], origin: &[f64]) -> (usize, f64) {
        self.bounding_of_many(dir, origin)
    }

    /// The moving variable with the smallest distance to its bound along
    /// its direction sign, together with that bound.
    fn bounding_of_many(&self, dir: &[(usize, f64)], origin: &[f64]) -> (usize, f64) {
        let first = self.minlp.var(dir[0].0);
        let mut best = (
            dir[0].0,
            if dir[0].1 < 0.0 { first.lb } else { first.ub },
        );
        let mut min_diff = f64::INFINITY;
        for &(v_idx, sign) in dir {
            let v = self.minlp.var(v_idx);
            let (bound, diff) = if sign < 0.0 {
                (v.lb, origin[v_idx] - v.lb)
            } else {
                (v.ub, v.ub - origin[v_idx])
            };
            if diff < min_diff {
                min_diff = diff;
                best = (v_idx, bound);
            }
        }
        best
    }

    /// Walk one direction: pick the step from the bounding variable, then
    /// look for a linearization point. Returns whether cuts were added.
    pub(crate) fn search(
        &mut self,
        rel: &mut Relaxation,
        dir: &[(usize, f64)],
        bounding: usize,
        mut varbound: f64,
        x_out: &mut Vec<f64>,
        scheme: SchemeTag,
    ) -> bool {
        let bound_sign = dir
            .iter()
            .find(|(v, _)| *v == bounding)
            .map(|&(_, s)| s)
            .unwrap_or(1.0);
        let val = x_out[bounding];

        // Step size: a quarter of the room to the bound, or a heuristic
        // with a synthesized bound when the side is infinite.
        let mut alpha;
        if varbound != bound_sign * f64::INFINITY {
            alpha = (varbound - val).abs();
        } else {
            let spread = self
                .sol_c
                .as_ref()
                .map_or(0.0, |c| (self.nlpx[bounding] - c[bounding]).abs());
            alpha = if spread != 0.0 { spread } else { val.abs() + 4.0 };
            varbound = val + bound_sign * (10.0 * val.abs() + 10.0);
        }
        alpha *= 0.25;
        if alpha == 0.0 {
            return false;
        }

        let steps: Vec<(usize, f64)> = dir.iter().map(|&(v, s)| (v, s * alpha)).collect();
        for &(v, s) in &steps {
            x_out[v] += s;
        }
        self.found_lin_pt(rel, &steps, bounding, varbound, bound_sign, x_out, scheme)
    }

    /// Walk until a constraint is violated, then bisect to the boundary
    /// and linearize the active nonlinear constraints there.
    #[allow(clippy::too_many_arguments)]
    fn found_lin_pt(
        &mut self,
        rel: &mut Relaxation,
        steps: &[(usize, f64)],
        bounding: usize,
        varbound: f64,
        bound_sign: f64,
        x_out: &mut [f64],
        scheme: SchemeTag,
    ) -> bool {
        let mut vio_cons: Vec<usize> = Vec::new();
        let mut nonlinear_hit;

        loop {
            vio_cons.clear();
            nonlinear_hit = false;
            for con in self.minlp.cons() {
                let ftype = con.ftype();
                if ftype == FunctionType::Constant {
                    continue;
                }
                let Ok(act) = con.activity(x_out) else {
                    return false;
                };
                if violates_ub(act, con.ub, self.feas_abs_tol, self.feas_rel_tol) {
                    vio_cons.push(con.index);
                    if ftype != FunctionType::Linear {
                        nonlinear_hit = true;
                    }
                }
            }
            if !vio_cons.is_empty() {
                break;
            }
            // nothing violated: take another step, stop at the bound
            for &(v, s) in steps {
                x_out[v] += s;
            }
            if bound_sign * (x_out[bounding] - varbound) > 0.0 {
                break;
            }
        }

        if !nonlinear_hit {
            // only linear constraints in the way, or the bound was reached
            return false;
        }

        // Bisect between the strictly feasible center and the outside
        // point until the active set stabilizes.
        let Some(center) = self.sol_c.clone() else {
            return false;
        };
        let mut x_in = center;
        let mut found = false;
        while self.find_boundary_pt(rel, &mut found, x_out, &mut x_in, &mut vio_cons, scheme) {}
        found
    }

    /// One bisection step: classify the still-relevant constraints at the
    /// midpoint into violated, active and inactive.
    ///
    /// Returns true while the bisection should continue. Sets `found` once
    /// linearizations were added at an acceptable boundary point.
    #[allow(clippy::too_many_arguments)]
    fn find_boundary_pt(
        &mut self,
        rel: &mut Relaxation,
        found: &mut bool,
        x_out: &mut [f64],
        x_in: &mut [f64],
        vio_cons: &mut Vec<usize>,
        scheme: SchemeTag,
    ) -> bool {
        let x: Vec<f64> = x_in
            .iter()
            .zip(x_out.iter())
            .map(|(a, b)| 0.5 * (a + b))
            .collect();

        let mut first_vio = false;
        let mut first_active = false;
        let mut vio_nl = false;
        let mut active_nl = false;
        let mut active_acts: Vec<f64> = Vec::new();

        let mut k = 0usize;
        while k < vio_cons.len() {
            let con = self.minlp.con(vio_cons[k]);
            let c_ub = con.ub;
            let Ok(act) = con.activity(&x) else {
                return false;
            };
            if violates_ub(act, c_ub, self.feas_abs_tol, self.feas_rel_tol) {
                if !first_vio {
                    first_vio = true;
                    if k != 0 {
                        vio_cons.drain(0..k);
                        k = 0;
                    }
                }
                if con.ftype() != FunctionType::Linear {
                    vio_nl = true;
                }
                k += 1;
            } else if is_active_at(act, c_ub, self.feas_abs_tol, self.feas_rel_tol) {
                if first_vio {
                    vio_cons.remove(k);
                } else {
                    if !first_active {
                        first_active = true;
                        if k != 0 {
                            vio_cons.drain(0..k);
                            k = 0;
                        }
                    }
                    active_acts.push(act);
                    if con.ftype() != FunctionType::Linear {
                        active_nl = true;
                    }
                    k += 1;
                }
            } else if first_vio || first_active {
                vio_cons.remove(k);
            } else {
                k += 1;
            }
        }

        if first_vio {
            if vio_nl {
                x_out.copy_from_slice(&x);
                return true;
            }
            return false;
        }
        if !first_active {
            // everything inactive: the midpoint is interior, move inward
            x_in.copy_from_slice(&x);
            return true;
        }
        if active_nl {
            for (j, &ci) in vio_cons.iter().enumerate() {
                let con = self.minlp.con(ci);
                if con.ftype() == FunctionType::Linear {
                    continue;
                }
                *found = true;
                let Ok((lf, c)) =
                    linear_at(&con.function, active_acts[j], &x, rel.num_vars(), self.coeff_tol)
                else {
                    continue;
                };
                let count = match scheme {
                    SchemeTag::Gs1 => {
                        self.stats.rgs1_cuts += 1;
                        self.stats.rgs1_cuts
                    }
                    SchemeTag::Gs2 => {
                        self.stats.rgs2_cuts += 1;
                        self.stats.rgs2_cuts
                    }
                    SchemeTag::Rs3 => {
                        self.stats.rs3_cuts += 1;
                        self.stats.rs3_cuts
                    }
                };
                let name = format!("_OAcut_{count}_AtRoot");
                rel.new_linear_constraint(lf, f64::NEG_INFINITY, con.ub - c, &name);
            }
        }
        false
    }
}
