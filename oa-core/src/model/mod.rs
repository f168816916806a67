//! Problem model: variables, functions, constraints, the problem arena and
//! its linear relaxation.

mod constraint;
mod function;
mod problem;
mod relaxation;
mod variable;

pub use constraint::{is_active_at, violates_lb, violates_ub, Constraint};
pub use function::{
    Function, FunctionType, LinearExpr, NegatedOracle, NonlinearOracle, QuadExpr,
};
pub use problem::{ObjSense, Objective, Problem, VarBoundMod};
pub use relaxation::{RelObjective, Relaxation};
pub use variable::{FunType, VarType, Variable};
