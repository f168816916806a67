//! RS1: tangent enumeration for univariate nonlinear constraints.
//!
//! Seeds tangents at the endpoints of the nonlinear variable's range,
//! intersects them, then repeatedly cuts at the vertex of maximum violation
//! until the approximation is tight enough. The candidate vertices live in
//! a list ordered along the nonlinear variable; each new tangent replaces
//! the dominated vertices by its intersections with the neighbouring cuts.

use nalgebra::{Matrix2, Vector2};
use oa_core::{Constraint, Relaxation};

use super::{RootCutGenerator, UniVar};

impl RootCutGenerator<'_> {
    /// Run RS1 on one admissible constraint.
    pub(crate) fn root_lin_scheme1(&mut self, rel: &mut Relaxation, con_idx: usize, uv: UniVar) {
        let UniVar {
            l_idx,
            l_coeff,
            n_idx,
            n_coeff,
        } = uv;
        let con = self.minlp.con(con_idx);
        let cons_ub = con.ub;
        let mut b1 = vec![0.0; rel.num_vars()];

        // Feasible window of the nonlinear variable; infinite sides fall
        // back to a +-50 window or a 100-wide extension of the finite side.
        let v = rel.var(n_idx);
        let (mut v_lb, mut v_ub) = (v.lb, v.ub);
        if v_lb == f64::NEG_INFINITY {
            if v_ub == f64::INFINITY {
                v_lb = -50.0;
                v_ub = 50.0;
            } else {
                v_lb = v_ub - 100.0;
            }
        } else if v_ub == f64::INFINITY {
            v_ub = v_lb + 100.0;
        }

        // Tangent at the lower endpoint.
        b1[n_idx] = v_lb;
        if !self.lin_part(&mut b1, l_idx, con_idx, l_coeff, n_coeff * v_lb) {
            return;
        }
        let Some(lo_cut) = self.add_cut_at_root(rel, &b1, con_idx) else {
            return;
        };
        let y1 = b1[l_idx];

        // Tangent at the upper endpoint.
        b1[n_idx] = v_ub;
        if !self.lin_part(&mut b1, l_idx, con_idx, l_coeff, n_coeff * v_ub) {
            return;
        }
        let Some(hi_cut) = self.add_cut_at_root(rel, &b1, con_idx) else {
            return;
        };
        let y2 = b1[l_idx];

        let Some(ip) = find_intersect_pt(rel, [lo_cut, hi_cut], l_idx, n_idx) else {
            return;
        };

        // Candidate vertices in cyclic order along the nonlinear variable,
        // with their violations of the original constraint.
        let mut xc = vec![v_lb, ip[0], v_ub];
        let mut yc = vec![y1, ip[1], y2];
        b1[n_idx] = ip[0];
        b1[l_idx] = ip[1];
        let Ok(act) = self.minlp.con(con_idx).activity(&b1) else {
            return;
        };
        let mut vio = vec![0.0, (act - cons_ub).max(0.0), 0.0];

        let mut i = 1usize;
        let mut max_vio = vio[i];
        let stop_cond = if cons_ub.abs() > self.feas_abs_tol {
            cons_ub * self.rs1 / 100.0
        } else {
            max_vio * self.rs1 / 100.0
        };
        if stop_cond < self.feas_abs_tol
            || (cons_ub != 0.0 && stop_cond < cons_ub.abs() * self.feas_rel_tol)
        {
            return;
        }

        while max_vio >= stop_cond {
            // Tangent at the vertex of maximum violation.
            b1[n_idx] = xc[i];
            b1[l_idx] = yc[i];
            let Some(new_id) = self.add_cut_at_root(rel, &b1, con_idx) else {
                break;
            };
            let (cut_lf_l, cut_lf_n, cut_ub) = {
                let newcon = rel.con(new_id);
                let lf = newcon.function.linear.as_ref().expect("RS1 cut is linear");
                (lf.coeff(l_idx), lf.coeff(n_idx), newcon.ub)
            };
            let (abs_tol, rel_tol) = (self.feas_abs_tol, self.feas_rel_tol);
            let satisfies = move |x: f64, y: f64| {
                let act = cut_lf_n * x + cut_lf_l * y;
                act < cut_ub + abs_tol || (cut_ub != 0.0 && act < cut_ub + cut_ub.abs() * rel_tol)
            };

            // Walk right: drop vertices dominated by the new cut, then
            // insert its intersection with the neighbouring cut.
            let mut ok = true;
            let mut j = i + 1;
            while j < xc.len() {
                if satisfies(xc[j], yc[j]) {
                    match intersect_with_line(
                        (xc[j], yc[j]),
                        (xc[j - 1], yc[j - 1]),
                        cut_lf_n,
                        cut_lf_l,
                        cut_ub,
                    ) {
                        Some((x, y)) => {
                            xc.insert(j, x);
                            yc.insert(j, y);
                            b1[n_idx] = x;
                            b1[l_idx] = y;
                            match self.minlp.con(con_idx).activity(&b1) {
                                Ok(a) => vio.insert(j, (a - cons_ub).max(0.0)),
                                Err(_) => ok = false,
                            }
                        }
                        None => ok = false,
                    }
                    break;
                } else {
                    xc.remove(j);
                    yc.remove(j);
                    vio.remove(j);
                }
            }
            if !ok {
                break;
            }

            // Walk left symmetrically; the tangent vertex itself is
            // dominated and gets dropped after the insertion.
            let mut j = i as i64 - 1;
            while j >= 0 {
                let ju = j as usize;
                if satisfies(xc[ju], yc[ju]) {
                    match intersect_with_line(
                        (xc[ju + 1], yc[ju + 1]),
                        (xc[ju], yc[ju]),
                        cut_lf_n,
                        cut_lf_l,
                        cut_ub,
                    ) {
                        Some((x, y)) => {
                            xc.insert(ju + 1, x);
                            yc.insert(ju + 1, y);
                            b1[n_idx] = x;
                            b1[l_idx] = y;
                            match self.minlp.con(con_idx).activity(&b1) {
                                Ok(a) => {
                                    vio.insert(ju + 1, (a - cons_ub).max(0.0));
                                    xc.remove(ju + 2);
                                    yc.remove(ju + 2);
                                    vio.remove(ju + 2);
                                }
                                Err(_) => ok = false,
                            }
                        }
                        None => ok = false,
                    }
                    break;
                } else {
                    xc.remove(ju);
                    yc.remove(ju);
                    vio.remove(ju);
                    j -= 1;
                }
            }
            if !ok {
                break;
            }

            max_vio = vio.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if max_vio < self.feas_abs_tol
                || (cons_ub != 0.0 && max_vio < cons_ub.abs() * self.feas_rel_tol)
            {
                break;
            }
            i = vio
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, _)| k)
                .unwrap_or(0);
        }
    }

    /// Complete the seed point: put the linear variable on the constraint
    /// boundary given the nonlinear variable's value. `act` carries the
    /// linear-part contribution of the nonlinear variable.
    pub(crate) fn lin_part(
        &self,
        b1: &mut [f64],
        l_idx: usize,
        con_idx: usize,
        l_coeff: f64,
        act: f64,
    ) -> bool {
        let con: &Constraint = self.minlp.con(con_idx);
        let mut nl_term = 0.0;
        if let Some(nlf) = &con.function.nonlinear {
            match nlf.eval(b1) {
                Ok(v) => nl_term = v,
                Err(_) => return false,
            }
        }
        if let Some(qf) = &con.function.quadratic {
            nl_term += qf.eval(b1);
        }
        b1[l_idx] = (con.ub - nl_term - act) / l_coeff;
        true
    }
}

/// Intersect the boundaries of two cuts in the (nonlinear, linear) plane.
/// Returns `(x_n, x_l)`.
fn find_intersect_pt(
    rel: &Relaxation,
    cut_ids: [usize; 2],
    l_idx: usize,
    n_idx: usize,
) -> Option<[f64; 2]> {
    let row = |id: usize| {
        let con = rel.con(id);
        let lf = con.function.linear.as_ref()?;
        Some((lf.coeff(l_idx), lf.coeff(n_idx), con.ub))
    };
    let (a, b, e) = row(cut_ids[0])?;
    let (c, d, f) = row(cut_ids[1])?;

    let m = Matrix2::new(a, b, c, d);
    let rhs = Vector2::new(e, f);
    match m.lu().solve(&rhs) {
        Some(sol) => Some([sol[1], sol[0]]),
        None => {
            log::warn!("singular tangent intersection system, skipping constraint");
            None
        }
    }
}

/// Intersect a cut boundary `cn * x + cl * y = ub` with the line through
/// two vertices (each given as `(x, y)` in the (nonlinear, linear) plane).
fn intersect_with_line(
    p1: (f64, f64),
    p2: (f64, f64),
    cn: f64,
    cl: f64,
    ub: f64,
) -> Option<(f64, f64)> {
    let (x1, y1) = p1;
    let (x2, y2) = p2;
    let a = y1 - y2;
    let b = x2 - x1;
    let e = y1 * (x2 - x1) - x1 * (y2 - y1);

    let m = Matrix2::new(a, b, cn, cl);
    let rhs = Vector2::new(e, ub);
    match m.lu().solve(&rhs) {
        Some(sol) => Some((sol[0], sol[1])),
        None => {
            log::warn!("singular vertex intersection system, stopping refinement");
            None
        }
    }
}
