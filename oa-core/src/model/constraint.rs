//! Constraints: a function with lower and upper bounds.

use crate::error::EvalError;
use crate::model::function::{Function, FunctionType};

/// Whether `act` violates the upper bound `ub` under the combined
/// absolute/relative tolerance rule.
pub fn violates_ub(act: f64, ub: f64, abs_tol: f64, rel_tol: f64) -> bool {
    act > ub + abs_tol && (ub == 0.0 || act > ub + ub.abs() * rel_tol)
}

/// Whether `act` violates the lower bound `lb` (symmetric rule).
pub fn violates_lb(act: f64, lb: f64, abs_tol: f64, rel_tol: f64) -> bool {
    act < lb - abs_tol && (lb == 0.0 || act < lb - lb.abs() * rel_tol)
}

/// Whether `act` sits on the bound `b` within tolerance.
pub fn is_active_at(act: f64, b: f64, abs_tol: f64, rel_tol: f64) -> bool {
    (act - b).abs() <= abs_tol || (b != 0.0 && (act - b).abs() <= b.abs() * rel_tol)
}

/// A constraint `lb <= f(x) <= ub`.
///
/// The index is assigned by the owning problem and stays stable for the
/// lifetime of the constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Position in the owning problem.
    pub index: usize,

    /// Display name, used only in logs.
    pub name: String,

    /// Constraint body.
    pub function: Function,

    /// Lower bound (may be -inf).
    pub lb: f64,

    /// Upper bound (may be +inf).
    pub ub: f64,
}

impl Constraint {
    /// Classification of the constraint body. Immutable for linear and
    /// constant constraints.
    pub fn ftype(&self) -> FunctionType {
        self.function.ftype()
    }

    /// Evaluate the constraint body at `x`.
    pub fn activity(&self, x: &[f64]) -> Result<f64, EvalError> {
        self.function.eval(x)
    }

    /// Whether the constraint is violated at `x` on either side.
    pub fn is_violated(&self, x: &[f64], abs_tol: f64, rel_tol: f64) -> Result<bool, EvalError> {
        let act = self.activity(x)?;
        Ok(violates_ub(act, self.ub, abs_tol, rel_tol)
            || violates_lb(act, self.lb, abs_tol, rel_tol))
    }
}
