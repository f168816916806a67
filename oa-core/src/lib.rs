//! Problem model and solver plumbing for the OA MINLP solver.
//!
//! This crate holds everything the outer-approximation cut engine builds on:
//!
//! - the problem model: variables, functions with linear / quadratic /
//!   opaque nonlinear parts, constraints, the mutable [`Problem`] arena and
//!   its linear [`Relaxation`];
//! - the engine abstraction for external NLP and MILP solvers with a single
//!   status classifier;
//! - the option database, solution pool, presolve driver and the
//!   auxiliary-variable directory used during reformulation.
//!
//! Nonlinear evaluation is an opaque oracle; derivative computation stays
//! outside this crate.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod model;
pub mod options;
pub mod presolve;
pub mod solution;
pub mod yeq;

pub use engine::{EngineSolution, EngineStatus, MilpEngine, NlpEngine, StatusAction};
pub use error::{CoreError, CoreResult, EvalError};
pub use model::{
    is_active_at, violates_lb, violates_ub, Constraint, FunType, Function, FunctionType,
    LinearExpr, NonlinearOracle, ObjSense, Objective, Problem, QuadExpr, RelObjective,
    Relaxation, VarBoundMod, VarType, Variable,
};
pub use options::SolverOptions;
pub use presolve::{PreMod, PresolveHandler, Presolver, SolveStatus};
pub use solution::{Solution, SolutionPool};
pub use yeq::YEqBivar;
