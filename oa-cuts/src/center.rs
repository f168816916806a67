//! Analytic interior point of the nonlinear feasible region.
//!
//! Every constraint of a cloned problem is relaxed by a slack `eta` and
//! `eta` is minimized; a strictly negative optimum certifies a Slater point.

use oa_core::{
    EngineStatus, FunctionType, LinearExpr, NlpEngine, ObjSense, Problem, StatusAction, VarType,
};

/// Build the eta-relaxed copy of `minlp` used for center finding.
///
/// Returns the instance and the index of the slack variable.
pub(crate) fn eta_problem(minlp: &Problem) -> (Problem, usize) {
    let mut inst = minlp.clone();
    let eta = inst.new_variable(f64::NEG_INFINITY, 0.0, VarType::Continuous, "eta");

    inst.remove_objective();
    inst.new_objective(
        oa_core::Function::from_linear(LinearExpr::from_terms([(eta, 1.0)])),
        0.0,
        ObjSense::Minimize,
    );

    let mut two_sided: Vec<usize> = Vec::new();
    for i in 0..inst.num_cons() {
        let con = inst.con(i);
        let (lb, ub) = (con.lb, con.ub);
        match con.ftype() {
            FunctionType::Constant => continue,
            FunctionType::Linear => {
                let lf = con.function.linear.clone().unwrap_or_default();
                if lb > f64::NEG_INFINITY && ub < f64::INFINITY {
                    if lb == ub {
                        continue;
                    }
                    two_sided.push(i);
                    inst.mark_delete(i);
                } else if lb > f64::NEG_INFINITY {
                    let mut shifted = lf;
                    shifted.add_term(eta, 1.0);
                    inst.change_constraint(i, shifted, lb, f64::INFINITY);
                } else if ub < f64::INFINITY {
                    let mut shifted = lf;
                    shifted.add_term(eta, -1.0);
                    inst.change_constraint(i, shifted, f64::NEG_INFINITY, ub);
                } else {
                    inst.mark_delete(i);
                }
            }
            _ => {
                let mut shifted = con.function.linear.clone().unwrap_or_default();
                shifted.add_term(eta, -1.0);
                inst.change_constraint(i, shifted, lb, ub);
            }
        }
    }

    // Two-sided linear rows are duplicated so both sides keep a slack.
    for &i in &two_sided {
        let con = inst.con(i);
        let lf = con.function.linear.clone().unwrap_or_default();
        let (lb, ub) = (con.lb, con.ub);
        let name = con.name.clone();

        let mut lo = lf.clone();
        lo.add_term(eta, 1.0);
        inst.new_constraint(
            oa_core::Function::from_linear(lo),
            lb,
            f64::INFINITY,
            &format!("{name}_lo"),
        );

        let mut hi = lf;
        hi.add_term(eta, -1.0);
        inst.new_constraint(
            oa_core::Function::from_linear(hi),
            f64::NEG_INFINITY,
            ub,
            &format!("{name}_hi"),
        );
    }
    inst.del_marked_cons();

    // Finite variable bounds get their own slacked rows.
    for v in 0..minlp.num_vars() {
        let (lb, ub) = (inst.var(v).lb, inst.var(v).ub);
        if lb == ub {
            continue;
        }
        if lb > f64::NEG_INFINITY {
            let lf = LinearExpr::from_terms([(v, 1.0), (eta, 1.0)]);
            inst.new_constraint(
                oa_core::Function::from_linear(lf),
                lb,
                f64::INFINITY,
                &format!("lb_{v}"),
            );
        }
        if ub < f64::INFINITY {
            let lf = LinearExpr::from_terms([(v, 1.0), (eta, -1.0)]);
            inst.new_constraint(
                oa_core::Function::from_linear(lf),
                f64::NEG_INFINITY,
                ub,
                &format!("ub_{v}"),
            );
        }
    }

    (inst, eta)
}

/// Find an analytic interior point of `minlp`.
///
/// Takes ownership of the NLP engine and releases it before returning.
/// Returns `None` when the region has no certified interior: infeasibility,
/// a non-negative optimum or an engine failure all just leave the center
/// unavailable, and schemes that need one skip themselves.
pub fn find_center(minlp: &Problem, mut nlpe: Box<dyn NlpEngine>) -> Option<Vec<f64>> {
    let (inst, _eta) = eta_problem(minlp);

    nlpe.load(&inst);
    let status = nlpe.solve();
    match status.action() {
        StatusAction::UsePrimal => {
            let sol = nlpe.solution()?;
            if sol.objective < 0.0 {
                Some(sol.primal[..minlp.num_vars()].to_vec())
            } else {
                log::debug!("center problem optimum {:.3e} >= 0, no interior", sol.objective);
                None
            }
        }
        StatusAction::UsePrimalCaveat | StatusAction::Infeasible => None,
        StatusAction::Fatal => {
            log::error!("center NLP engine status = {}", nlpe.status_string());
            None
        }
    }
}
