//! Root-node linearization schemes.
//!
//! Populates the relaxation with outer-approximation cuts before the tree
//! search starts. Five schemes are available:
//!
//! - RS1: tangent enumeration for constraints whose nonlinear part is
//!   univariate, refined at the point of maximum violation;
//! - RS2: neighbourhood scan around the NLP point, emitting a tangent
//!   whenever the slope has moved enough;
//! - RS3: supporting hyperplanes found by line search from the analytic
//!   center toward violating MILP iterates;
//! - GS1/GS2: positive-spanning-set sampling around the center (GS1) or the
//!   NLP point projected through a fixing hyperplane (GS2).

mod esh;
mod general;
mod scheme1;
mod scheme2;

use oa_core::{
    violates_ub, Constraint, FunctionType, Problem, Relaxation, SolverOptions,
};

use crate::linearize::linear_at;

/// Cut counters per root scheme.
#[derive(Debug, Default, Clone)]
pub struct LinStats {
    /// Cuts from RS1.
    pub rs1_cuts: u32,

    /// Cuts from RS2.
    pub rs2_cuts: u32,

    /// Cuts from RS3.
    pub rs3_cuts: u32,

    /// Cuts from GS1.
    pub rgs1_cuts: u32,

    /// Cuts from GS2.
    pub rgs2_cuts: u32,
}

/// Which scheme a shared helper is generating cuts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchemeTag {
    Gs1,
    Gs2,
    Rs3,
}

/// A constraint admissible for RS1/RS2: univariate nonlinear part plus a
/// linear variable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniVar {
    /// Index of the linear variable.
    pub l_idx: usize,

    /// Its coefficient in the linear part.
    pub l_coeff: f64,

    /// Index of the variable carrying the nonlinear part.
    pub n_idx: usize,

    /// Its coefficient in the linear part (zero if absent).
    pub n_coeff: f64,
}

/// Root-node cut generator.
pub struct RootCutGenerator<'a> {
    pub(crate) minlp: &'a Problem,
    pub(crate) nl_cons: Vec<usize>,

    pub(crate) rs1: f64,
    pub(crate) rs2_per: f64,
    pub(crate) rs2_nbh: f64,
    pub(crate) rs3: u32,
    pub(crate) rgs1: bool,
    pub(crate) rgs2: bool,

    pub(crate) feas_abs_tol: f64,
    pub(crate) feas_rel_tol: f64,
    pub(crate) obj_abs_tol: f64,
    pub(crate) obj_rel_tol: f64,
    pub(crate) coeff_tol: f64,

    pub(crate) sol_c: Option<Vec<f64>>,
    pub(crate) nlpx: Vec<f64>,
    pub(crate) var_ptrs: Vec<usize>,
    pub(crate) stats: LinStats,
}

impl<'a> RootCutGenerator<'a> {
    /// Create a generator for the nonlinear constraints `nl_cons` of
    /// `minlp`.
    pub fn new(minlp: &'a Problem, nl_cons: Vec<usize>, options: &SolverOptions) -> Self {
        Self {
            minlp,
            nl_cons,
            rs1: options.root_lin_scheme1,
            rs2_per: options.root_lin_scheme2_per,
            rs2_nbh: options.root_lin_scheme2_nbh_size,
            rs3: options.root_lin_scheme3,
            rgs1: options.root_gen_lin_scheme1,
            rgs2: options.root_gen_lin_scheme2,
            feas_abs_tol: options.feas_abs_tol,
            feas_rel_tol: options.feas_rel_tol,
            obj_abs_tol: options.sol_abs_tol,
            obj_rel_tol: options.sol_rel_tol,
            coeff_tol: options.con_coeff_tol,
            sol_c: None,
            nlpx: Vec::new(),
            var_ptrs: Vec::new(),
            stats: LinStats::default(),
        }
    }

    /// Install an analytic interior point for the center-based schemes.
    pub fn set_center(&mut self, sol_c: Option<Vec<f64>>) {
        self.sol_c = sol_c;
    }

    /// The installed center, if any.
    pub fn center(&self) -> Option<&[f64]> {
        self.sol_c.as_deref()
    }

    /// Cut counters.
    pub fn stats(&self) -> &LinStats {
        &self.stats
    }

    /// Run the RS1/RS2/GS1/GS2 schemes at the NLP primal `nlpx`.
    ///
    /// RS3 runs separately through [`RootCutGenerator::root_lin_scheme3`]
    /// because it iterates with the MILP engine.
    pub fn root_linearizations(&mut self, rel: &mut Relaxation, nlpx: &[f64]) {
        self.nlpx = nlpx.to_vec();

        if self.rs1 > 0.0 || self.rs2_per > 0.0 {
            for ci in self.nl_cons.clone() {
                let Some(uv) = self.uni_var_nl_func(self.minlp.con(ci)) else {
                    continue;
                };
                if self.rs1 > 0.0 {
                    self.root_lin_scheme1(rel, ci, uv);
                }
                if self.rs2_per > 0.0 {
                    self.root_lin_scheme2(rel, ci, uv);
                }
            }
        }

        if (self.rgs1 || self.rgs2) && self.sol_c.is_some() {
            self.vars_in_nonlin_cons();
            if self.rgs1 {
                self.root_lin_gen_scheme1(rel);
            }
            if self.rgs2 {
                self.root_lin_gen_scheme2(rel);
            }
        }
    }

    /// Probe whether a constraint qualifies for the univariate schemes:
    /// its nonlinear part must touch exactly one variable (the quadratic
    /// part, if any, must agree) and the linear part must contain another
    /// variable with a workable coefficient.
    pub(crate) fn uni_var_nl_func(&self, con: &Constraint) -> Option<UniVar> {
        let mut n_idx: Option<usize> = None;

        if let Some(nlf) = &con.function.nonlinear {
            if nlf.vars().len() != 1 {
                return None;
            }
            n_idx = Some(nlf.vars()[0]);
        }
        if let Some(qf) = &con.function.quadratic {
            let qvars = qf.vars();
            if !qvars.is_empty() {
                if qvars.len() > 1 {
                    return None;
                }
                match n_idx {
                    Some(ni) if ni != qvars[0] => return None,
                    None => n_idx = Some(qvars[0]),
                    _ => {}
                }
            }
        }
        let n_idx = n_idx?;

        let mut linear: Option<(usize, f64)> = None;
        let mut n_coeff = 0.0;
        if let Some(lf) = &con.function.linear {
            for (idx, coeff) in lf.iter() {
                if idx == n_idx {
                    n_coeff = coeff;
                    continue;
                }
                if coeff.abs() > self.coeff_tol && linear.is_none() {
                    linear = Some((idx, coeff));
                }
                if linear.is_some() && n_coeff != 0.0 {
                    break;
                }
            }
        }
        linear.map(|(l_idx, l_coeff)| UniVar {
            l_idx,
            l_coeff,
            n_idx,
            n_coeff,
        })
    }

    /// Collect the variables appearing in nonlinear terms anywhere in the
    /// problem, in order of first appearance.
    pub(crate) fn vars_in_nonlin_cons(&mut self) {
        self.var_ptrs.clear();
        for con in self.minlp.cons() {
            let ft = con.ftype();
            if ft == FunctionType::Linear || ft == FunctionType::Constant {
                continue;
            }
            if let Some(nlf) = &con.function.nonlinear {
                for &v in nlf.vars() {
                    if !self.var_ptrs.contains(&v) {
                        self.var_ptrs.push(v);
                    }
                }
            }
            if let Some(qf) = &con.function.quadratic {
                for v in qf.vars() {
                    if !self.var_ptrs.contains(&v) {
                        self.var_ptrs.push(v);
                    }
                }
            }
        }
    }

    /// Linearize a source constraint at `x` and add the cut to the
    /// relaxation. Returns the new constraint index. Used by RS1.
    pub(crate) fn add_cut_at_root(
        &mut self,
        rel: &mut Relaxation,
        x: &[f64],
        con_idx: usize,
    ) -> Option<usize> {
        let con = self.minlp.con(con_idx);
        let Ok(act) = con.activity(x) else {
            log::error!("constraint {} is not defined at this point", con.name);
            return None;
        };
        let (lf, c) = linear_at(&con.function, act, x, rel.num_vars(), self.coeff_tol).ok()?;
        self.stats.rs1_cuts += 1;
        let name = format!("_OAcut_{}_AtRoot", self.stats.rs1_cuts);
        Some(rel.new_linear_constraint(lf, f64::NEG_INFINITY, con.ub - c, &name))
    }

    /// Largest violation over the nonlinear constraints at `x`, as a
    /// percentage of the rhs (absolute for near-zero rhs), with the index
    /// of the worst constraint.
    pub fn max_vio(&self, x: &[f64]) -> (f64, Option<usize>) {
        let mut max = f64::NEG_INFINITY;
        let mut index = None;
        for (i, &ci) in self.nl_cons.iter().enumerate() {
            let con = self.minlp.con(ci);
            let Ok(act) = con.activity(x) else {
                continue;
            };
            let c_ub = con.ub;
            if violates_ub(act, c_ub, self.feas_abs_tol, self.feas_rel_tol) {
                let vio = if c_ub.abs() > self.feas_abs_tol {
                    100.0 * (act - c_ub) / c_ub.abs()
                } else {
                    act - c_ub
                };
                if vio > max {
                    max = vio;
                    index = Some(i);
                }
            }
        }
        (max, index)
    }

    /// Log the per-scheme cut counts.
    pub fn log_stats(&self) {
        log::info!(
            "root cuts: rs1 = {}, rs2 = {}, rs3 = {}, rgs1 = {}, rgs2 = {}",
            self.stats.rs1_cuts,
            self.stats.rs2_cuts,
            self.stats.rs3_cuts,
            self.stats.rgs1_cuts,
            self.stats.rgs2_cuts,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oa_core::{EvalError, Function, LinearExpr, NonlinearOracle, QuadExpr, VarType};
    use std::sync::Arc;

    struct Exp {
        vars: [usize; 1],
    }

    impl NonlinearOracle for Exp {
        fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
            Ok(x[self.vars[0]].exp())
        }

        fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), EvalError> {
            grad[self.vars[0]] += x[self.vars[0]].exp();
            Ok(())
        }

        fn vars(&self) -> &[usize] {
            &self.vars
        }
    }

    fn probe_problem() -> Problem {
        let mut p = Problem::new();
        p.new_variable(0.0, 4.0, VarType::Continuous, "x");
        p.new_variable(0.0, 4.0, VarType::Continuous, "y");
        p.new_variable(0.0, 4.0, VarType::Continuous, "z");
        p
    }

    #[test]
    fn test_uni_var_probe_accepts_single_nonlinear_var() {
        let mut p = probe_problem();
        // exp(x) + 2y <= 3
        let ci = p.new_constraint(
            Function::from_nonlinear(
                Arc::new(Exp { vars: [0] }),
                Some(LinearExpr::from_terms([(1, 2.0)])),
            ),
            f64::NEG_INFINITY,
            3.0,
            "c0",
        );
        let opts = SolverOptions::default();
        let generator = RootCutGenerator::new(&p, vec![ci], &opts);
        let uv = generator.uni_var_nl_func(p.con(ci)).unwrap();
        assert_eq!(uv.n_idx, 0);
        assert_eq!(uv.l_idx, 1);
        assert_eq!(uv.l_coeff, 2.0);
        assert_eq!(uv.n_coeff, 0.0);
    }

    #[test]
    fn test_uni_var_probe_reads_nonlinear_vars_linear_coeff() {
        let mut p = probe_problem();
        // x^2 + 3x - y <= 0 via a quadratic part
        let ci = p.new_constraint(
            Function::from_quadratic(
                QuadExpr::from_terms([(0, 0, 1.0)]),
                Some(LinearExpr::from_terms([(0, 3.0), (1, -1.0)])),
            ),
            f64::NEG_INFINITY,
            0.0,
            "c0",
        );
        let opts = SolverOptions::default();
        let generator = RootCutGenerator::new(&p, vec![ci], &opts);
        let uv = generator.uni_var_nl_func(p.con(ci)).unwrap();
        assert_eq!(uv.n_idx, 0);
        assert_eq!(uv.n_coeff, 3.0);
        assert_eq!(uv.l_idx, 1);
        assert_eq!(uv.l_coeff, -1.0);
    }

    #[test]
    fn test_uni_var_probe_rejects_multivariate_and_mismatch() {
        let mut p = probe_problem();
        // two quadratic vars
        let c0 = p.new_constraint(
            Function::from_quadratic(
                QuadExpr::from_terms([(0, 1, 1.0)]),
                Some(LinearExpr::from_terms([(2, 1.0)])),
            ),
            f64::NEG_INFINITY,
            0.0,
            "c0",
        );
        // nonlinear var != quadratic var
        let c1 = p.new_constraint(
            Function {
                linear: Some(LinearExpr::from_terms([(2, 1.0)])),
                quadratic: Some(QuadExpr::from_terms([(1, 1, 1.0)])),
                nonlinear: Some(Arc::new(Exp { vars: [0] })),
            },
            f64::NEG_INFINITY,
            0.0,
            "c1",
        );
        // no linear variable besides the nonlinear one
        let c2 = p.new_constraint(
            Function::from_quadratic(
                QuadExpr::from_terms([(0, 0, 1.0)]),
                Some(LinearExpr::from_terms([(0, 1.0)])),
            ),
            f64::NEG_INFINITY,
            0.0,
            "c2",
        );
        let opts = SolverOptions::default();
        let generator = RootCutGenerator::new(&p, vec![c0, c1, c2], &opts);
        assert!(generator.uni_var_nl_func(p.con(c0)).is_none());
        assert!(generator.uni_var_nl_func(p.con(c1)).is_none());
        assert!(generator.uni_var_nl_func(p.con(c2)).is_none());
    }

    #[test]
    fn test_vars_in_nonlin_cons_dedups() {
        let mut p = probe_problem();
        p.new_constraint(
            Function::from_quadratic(QuadExpr::from_terms([(0, 1, 1.0)]), None),
            f64::NEG_INFINITY,
            1.0,
            "q0",
        );
        p.new_constraint(
            Function::from_nonlinear(Arc::new(Exp { vars: [1] }), None),
            f64::NEG_INFINITY,
            1.0,
            "n0",
        );
        let opts = SolverOptions::default();
        let mut generator = RootCutGenerator::new(&p, vec![0, 1], &opts);
        generator.vars_in_nonlin_cons();
        assert_eq!(generator.var_ptrs, vec![0, 1]);
    }

    #[test]
    fn test_max_vio_prefers_relative_violation() {
        let mut p = probe_problem();
        // x <= 10 modeled as quadratic-free would be linear, so use x^2 <= 100
        let c0 = p.new_constraint(
            Function::from_quadratic(QuadExpr::from_terms([(0, 0, 1.0)]), None),
            f64::NEG_INFINITY,
            100.0,
            "big",
        );
        // y^2 <= 0
        let c1 = p.new_constraint(
            Function::from_quadratic(QuadExpr::from_terms([(1, 1, 1.0)]), None),
            f64::NEG_INFINITY,
            0.0,
            "small",
        );
        let opts = SolverOptions::default();
        let generator = RootCutGenerator::new(&p, vec![c0, c1], &opts);

        // x = 11 -> act 121, 21% violation; y = 1 -> act 1, absolute 1.0
        let (max, idx) = generator.max_vio(&[11.0, 1.0, 0.0]);
        assert_eq!(idx, Some(0));
        assert!((max - 21.0).abs() < 1e-9);
    }
}
