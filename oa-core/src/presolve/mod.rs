//! Presolver: standardization plus an iterated pipeline of reduction
//! handlers with convergence detection.

use crate::model::{FunctionType, ObjSense, Problem, VarType};
use crate::options::SolverOptions;
use crate::solution::Solution;

/// Status of an outer solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Nothing has run yet.
    NotStarted,

    /// A solve is in progress.
    Started,

    /// The solve finished without settling the problem.
    Finished,

    /// Optimality was proven.
    SolvedOptimal,

    /// Infeasibility was proven.
    SolvedInfeasible,

    /// Unboundedness was proven.
    SolvedUnbounded,

    /// A component broke one of its contracts.
    SolveError,
}

/// A reversible record of one presolve transformation.
///
/// Post-solving maps a solution of the reduced problem back to the original
/// variable space by folding `postsolve_x` over the recorded modifications
/// left to right.
pub trait PreMod {
    /// Transform a solution one step back toward the original space.
    fn postsolve_x(&self, x: &[f64]) -> Vec<f64>;
}

/// A reduction handler in the presolve pipeline.
pub trait PresolveHandler {
    /// Handler name for logs.
    fn name(&self) -> &str;

    /// Attempt reductions on the problem.
    ///
    /// Sets `changed` when any reduction was applied and appends one
    /// `PreMod` per transformation. A handler that settles the problem
    /// returns `SolvedOptimal` (with a solution), `SolvedInfeasible` or
    /// `SolvedUnbounded`; otherwise `Finished`.
    fn presolve(
        &mut self,
        problem: &mut Problem,
        mods: &mut Vec<Box<dyn PreMod>>,
        changed: &mut bool,
    ) -> (SolveStatus, Option<Solution>);
}

/// Driver for the presolve pipeline.
pub struct Presolver {
    handlers: Vec<Box<dyn PresolveHandler>>,
    mods: Vec<Box<dyn PreMod>>,
    sol: Option<Solution>,
    status: SolveStatus,
    obj_sense: f64,
    int_tol: f64,
    display_size: bool,
    display_problem: bool,
}

/// Hard cap on major iterations of the handler loop.
const MAX_MAJOR_ITERS: usize = 5;

impl Presolver {
    /// Create a presolver over the given handler pipeline.
    pub fn new(handlers: Vec<Box<dyn PresolveHandler>>, options: &SolverOptions) -> Self {
        Self {
            handlers,
            mods: Vec::new(),
            sol: None,
            status: SolveStatus::NotStarted,
            obj_sense: 1.0,
            int_tol: options.int_tol,
            display_size: options.display_presolved_size,
            display_problem: options.display_presolved_problem,
        }
    }

    /// Current status.
    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Objective sense multiplier for display: -1 after a maximization
    /// objective was negated, 1 otherwise.
    pub fn obj_sense(&self) -> f64 {
        self.obj_sense
    }

    /// Solution found during presolve, if a handler settled the problem.
    pub fn solution(&self) -> Option<&Solution> {
        self.sol.as_ref()
    }

    /// One-shot standardization: minimization form, integer-to-binary
    /// promotion, upper-bounded inequality form.
    pub fn standardize(&mut self, problem: &mut Problem) {
        self.remove_empty_obj(problem);
        self.minimizify(problem);
        self.ints_are_bins(problem);
        self.standardize_constraints(problem);
    }

    /// Run the handler pipeline to a fixed point.
    pub fn solve(&mut self, problem: &mut Problem) -> SolveStatus {
        let mut changed = true;
        let mut stop = false;
        let mut iters = 0usize;
        let mut subiters: i64 = 0;
        let mut last_ch_subiter: i64 = -10000;
        let n_hand = self.handlers.len() as i64;

        self.status = SolveStatus::Started;
        log::info!("presolving ...");

        while changed && !stop && iters < MAX_MAJOR_ITERS {
            log::debug!("presolve major iteration {iters}");
            for h in &mut self.handlers {
                changed = false;
                let (h_status, h_sol) = h.presolve(problem, &mut self.mods, &mut changed);
                match h_status {
                    SolveStatus::SolvedOptimal => {
                        log::debug!("handler {} found an optimal solution", h.name());
                        self.status = SolveStatus::SolvedOptimal;
                        stop = true;
                        match h_sol {
                            Some(s) => self.sol = Some(s),
                            None => {
                                log::error!(
                                    "handler {} reported optimal but returned no solution",
                                    h.name()
                                );
                                self.status = SolveStatus::SolveError;
                            }
                        }
                        break;
                    }
                    SolveStatus::SolvedInfeasible | SolveStatus::SolvedUnbounded => {
                        self.status = h_status;
                        stop = true;
                        break;
                    }
                    _ => {}
                }
                if changed {
                    last_ch_subiter = subiters;
                }
                if subiters > n_hand - 2 && subiters - last_ch_subiter > n_hand - 2 {
                    stop = true;
                    break;
                }
                subiters += 1;
            }
            iters += 1;
        }

        if self.status == SolveStatus::Started {
            self.status = SolveStatus::Finished;
        }
        log::info!("finished presolving");

        if self.display_size {
            log::info!(
                "presolved size: {} variables, {} constraints",
                problem.num_vars(),
                problem.num_cons()
            );
        }
        if self.display_problem {
            for c in problem.cons() {
                log::info!("presolved {}: {} <= {:?} <= {}", c.name, c.lb, c.function, c.ub);
            }
        }
        self.status
    }

    /// Map a solution of the presolved problem back to the original
    /// variable space: a left-to-right fold over the recorded mods.
    pub fn get_x(&self, x: &[f64]) -> Vec<f64> {
        let mut cur = x.to_vec();
        for m in &self.mods {
            cur = m.postsolve_x(&cur);
        }
        cur
    }

    /// Post-solve an entire solution.
    pub fn post_sol(&self, s: &Solution) -> Solution {
        Solution::new(s.objective, self.get_x(&s.x))
    }

    fn remove_empty_obj(&mut self, problem: &mut Problem) {
        if problem
            .objective()
            .is_some_and(|o| o.function.ftype() == FunctionType::Constant)
        {
            problem.remove_objective();
        }
    }

    fn minimizify(&mut self, problem: &mut Problem) {
        if problem.objective().is_some_and(|o| o.sense == ObjSense::Maximize) {
            problem.negate_objective();
            self.obj_sense = -1.0;
        }
    }

    fn ints_are_bins(&mut self, problem: &mut Problem) {
        let promote: Vec<usize> = problem
            .vars()
            .filter(|v| {
                v.vtype == VarType::Integer
                    && v.ub <= 1.0 + self.int_tol
                    && v.lb >= -self.int_tol
            })
            .map(|v| v.index)
            .collect();
        for idx in promote {
            problem.set_var_type(idx, VarType::Binary);
        }
    }

    fn standardize_constraints(&mut self, problem: &mut Problem) {
        let reverse: Vec<usize> = problem
            .cons()
            .filter(|c| c.lb > f64::NEG_INFINITY && c.ub >= f64::INFINITY)
            .map(|c| c.index)
            .collect();
        for idx in reverse {
            problem.reverse_sense(idx);
        }
    }
}
