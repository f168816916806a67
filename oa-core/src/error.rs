//! Error types for the solver core.

use std::fmt;

use thiserror::Error;

/// Errors that can occur in the optimization core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Problem or relaxation validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// An engine returned a status that is fatal for the current operation
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// A subproblem that must be feasible was proven infeasible
    #[error("Problem is infeasible")]
    Infeasible,

    /// The problem is unbounded
    #[error("Problem is unbounded")]
    Unbounded,

    /// A component broke one of its contracts
    #[error("Invariant violation: {0}")]
    Invariant(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure of a numeric oracle (point or gradient evaluation).
///
/// Evaluation errors are swallowed close to where they occur: the affected
/// linearization, bisection step or cut is dropped and the surrounding loop
/// moves on to its next candidate. They therefore carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalError;

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function not defined at this point")
    }
}

impl std::error::Error for EvalError {}
