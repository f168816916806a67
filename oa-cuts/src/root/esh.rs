//! RS3: extended supporting hyperplanes from MILP iterates.
//!
//! For each nonlinear constraint violated at the current relaxation
//! solution, a boundary point is found by bisection along the segment from
//! the analytic center, and a tangent is taken there. When the objective is
//! nonlinear, it is linearized at the boundary point closest to the center.
//! The relaxation is re-solved and the round repeats.

use oa_core::{
    is_active_at, violates_ub, CoreError, CoreResult, EngineStatus, MilpEngine, Relaxation,
    StatusAction,
};

use super::RootCutGenerator;
use crate::linearize::linear_at;

/// Bisection cap; the tolerance is normally reached far earlier.
const MAX_BISECTIONS: usize = 100;

impl RootCutGenerator<'_> {
    /// Run up to `root_lin_scheme3` rounds of supporting-hyperplane
    /// separation against the MILP engine, which must hold a solved
    /// relaxation. Returns whether any cut was generated.
    pub fn root_lin_scheme3(
        &mut self,
        rel: &mut Relaxation,
        lpe: &mut dyn MilpEngine,
        obj_var: Option<usize>,
    ) -> CoreResult<bool> {
        if self.sol_c.is_none() {
            log::debug!("no analytic center, skipping supporting-hyperplane rounds");
            return Ok(false);
        }
        let o_nl = self.minlp.obj_ftype() > oa_core::FunctionType::Linear;

        for _round in 0..self.rs3 {
            let (lpx, obj_val) = {
                let sol = lpe.solution().ok_or_else(|| {
                    CoreError::EngineFailure("MILP engine has no solution for separation".into())
                })?;
                (sol.primal.clone(), sol.objective)
            };
            let num_old = self.stats.rs3_cuts;

            let mut boundary: Option<Vec<f64>> = None;
            let mut min_dist = f64::INFINITY;
            for ci in self.nl_cons.clone() {
                let con = self.minlp.con(ci);
                let Ok(act) = con.activity(&lpx) else {
                    log::error!("constraint {} is not defined at this point", con.name);
                    continue;
                };
                if !violates_ub(act, con.ub, self.feas_abs_tol, self.feas_rel_tol) {
                    continue;
                }
                if let Some(xnew) = self.cut_at_line_search_pt(rel, &lpx, ci) {
                    if o_nl {
                        let d = distance(self.sol_c.as_ref().unwrap(), &xnew);
                        if d < min_dist {
                            min_dist = d;
                            boundary = Some(xnew);
                        }
                    }
                }
            }

            if self.stats.rs3_cuts == num_old {
                break;
            }
            if let Some(bpt) = boundary {
                self.objective_cut_at(rel, &bpt, obj_val, obj_var);
            }

            lpe.load(rel);
            let status = lpe.solve();
            if self.should_stop(status) {
                break;
            }
        }
        Ok(self.stats.rs3_cuts > 0)
    }

    /// Bisect toward the boundary of one violated constraint and cut there.
    /// Returns the boundary point when a cut was added.
    pub(crate) fn cut_at_line_search_pt(
        &mut self,
        rel: &mut Relaxation,
        x_out: &[f64],
        con_idx: usize,
    ) -> Option<Vec<f64>> {
        let (xnew, act) = self.line_search_pt(x_out, con_idx)?;
        let con = self.minlp.con(con_idx);
        let (lf, c) = linear_at(&con.function, act, &xnew, rel.num_vars(), self.coeff_tol).ok()?;
        self.stats.rs3_cuts += 1;
        let name = format!("_OAcut_{}", self.stats.rs3_cuts);
        rel.new_linear_constraint(lf, f64::NEG_INFINITY, con.ub - c, &name);
        Some(xnew)
    }

    /// Bisection along the segment from the center to `u` until the
    /// constraint activity sits on its upper bound within tolerance.
    pub(crate) fn line_search_pt(&self, u: &[f64], con_idx: usize) -> Option<(Vec<f64>, f64)> {
        let sol_c = self.sol_c.as_ref()?;
        let con = self.minlp.con(con_idx);
        let c_ub = con.ub;
        let n = self.minlp.num_vars();

        let mut xl = sol_c.clone();
        let mut xu = u[..n].to_vec();
        for _ in 0..MAX_BISECTIONS {
            let x: Vec<f64> = xl.iter().zip(&xu).map(|(l, v)| 0.5 * (l + v)).collect();
            let act = con.activity(&x).ok()?;
            if violates_ub(act, c_ub, self.feas_abs_tol, self.feas_rel_tol) {
                xu = x;
            } else if is_active_at(act, c_ub, self.feas_abs_tol, self.feas_rel_tol) {
                return Some((x, act));
            } else {
                xl = x;
            }
        }
        log::warn!("line search did not reach the boundary of {}", con.name);
        None
    }

    /// Linearize a nonlinear objective at the boundary point and bound it
    /// by the objective variable.
    fn objective_cut_at(
        &mut self,
        rel: &mut Relaxation,
        bpt: &[f64],
        obj_val: f64,
        obj_var: Option<usize>,
    ) {
        let Some(eta) = obj_var else {
            log::error!("nonlinear objective without an objective variable");
            return;
        };
        let Some(o) = self.minlp.objective() else {
            return;
        };
        let Ok(act) = o.function.eval(bpt) else {
            log::error!("objective not defined at this solution point");
            return;
        };
        let vio = (act - obj_val).max(0.0);
        if vio <= self.obj_abs_tol || (obj_val != 0.0 && vio <= obj_val.abs() * self.obj_rel_tol) {
            return;
        }
        let Ok((mut lf, c)) = linear_at(&o.function, act, bpt, rel.num_vars(), self.coeff_tol)
        else {
            return;
        };
        let lpvio = (c + lf.eval(bpt) - obj_val).max(0.0);
        if lpvio > self.obj_abs_tol
            && ((obj_val - c) == 0.0 || lpvio > (obj_val - c).abs() * self.obj_rel_tol)
        {
            self.stats.rs3_cuts += 1;
            lf.add_term(eta, -1.0);
            let name = format!("_OAObjCut_{}", self.stats.rs3_cuts);
            rel.new_linear_constraint(lf, f64::NEG_INFINITY, -c, &name);
        }
    }

    /// Whether a relaxation status ends the separation rounds.
    fn should_stop(&self, status: EngineStatus) -> bool {
        match status.action() {
            StatusAction::UsePrimal => false,
            StatusAction::UsePrimalCaveat => {
                log::info!("engine hit iteration limit, continuing in root");
                false
            }
            StatusAction::Infeasible => true,
            StatusAction::Fatal => {
                log::error!("relaxation engine status = {}", status.as_str());
                true
            }
        }
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
