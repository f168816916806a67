//! The linear relaxation managed alongside the MILP engine.
//!
//! A `Relaxation` holds the polyhedral side of the solve: the original
//! variables, the linear constraints of the source problem and every OA cut
//! generated afterwards. Variable indices are dense and contiguous;
//! constraint indices stay stable for the lifetime of a constraint.

use sprs::{CsMat, TriMat};

use crate::model::constraint::Constraint;
use crate::model::function::{Function, FunctionType, LinearExpr};
use crate::model::problem::Problem;
use crate::model::variable::{FunType, VarType, Variable};

/// Linear objective of the relaxation.
#[derive(Debug, Clone, Default)]
pub struct RelObjective {
    /// Linear objective expression.
    pub linear: LinearExpr,

    /// Additive constant.
    pub constant: f64,
}

/// A mutable linear relaxation.
#[derive(Debug, Clone, Default)]
pub struct Relaxation {
    vars: Vec<Variable>,
    cons: Vec<Constraint>,
    objective: Option<RelObjective>,
    next_id: u32,
}

impl Relaxation {
    /// Empty relaxation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial relaxation of a problem: all variables plus the
    /// linear constraints. Nonlinear constraints are left out; they enter
    /// later as OA cuts. A linear objective is carried over.
    pub fn from_problem(p: &Problem) -> Self {
        let mut rel = Self::new();
        for v in p.vars() {
            rel.vars.push(v.clone());
            rel.next_id = rel.next_id.max(v.id + 1);
        }
        for c in p.cons() {
            if c.ftype() == FunctionType::Linear {
                let lin = c.function.linear.clone().unwrap_or_default();
                rel.new_linear_constraint(lin, c.lb, c.ub, &c.name);
            }
        }
        if let Some(o) = p.objective() {
            if o.function.ftype() <= FunctionType::Linear {
                rel.objective = Some(RelObjective {
                    linear: o.function.linear.clone().unwrap_or_default(),
                    constant: o.constant,
                });
            }
        }
        rel
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Number of constraints, including cleared rows.
    pub fn num_cons(&self) -> usize {
        self.cons.len()
    }

    /// Variable by index.
    pub fn var(&self, index: usize) -> &Variable {
        &self.vars[index]
    }

    /// Constraint by index.
    pub fn con(&self, index: usize) -> &Constraint {
        &self.cons[index]
    }

    /// Iterate variables in index order.
    pub fn vars(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Iterate constraints in index order.
    pub fn cons(&self) -> impl Iterator<Item = &Constraint> {
        self.cons.iter()
    }

    /// Add a variable; returns its index.
    pub fn new_variable(&mut self, lb: f64, ub: f64, vtype: VarType, name: &str) -> usize {
        let index = self.vars.len();
        self.vars.push(Variable {
            id: self.next_id,
            index,
            name: name.to_string(),
            vtype,
            ftype: FunType::Linear,
            lb,
            ub,
        });
        self.next_id += 1;
        index
    }

    /// Add a linear constraint `lb <= lin <= ub`; returns its index.
    pub fn new_linear_constraint(&mut self, lin: LinearExpr, lb: f64, ub: f64, name: &str) -> usize {
        let index = self.cons.len();
        self.cons.push(Constraint {
            index,
            name: name.to_string(),
            function: Function::from_linear(lin),
            lb,
            ub,
        });
        index
    }

    /// Replace a constraint's coefficients and bounds in place.
    pub fn change_constraint(&mut self, index: usize, lin: LinearExpr, lb: f64, ub: f64) {
        let c = &mut self.cons[index];
        c.function = Function::from_linear(lin);
        c.lb = lb;
        c.ub = ub;
    }

    /// Clear a constraint to a vacuous row. The row keeps its index so
    /// other constraint indices stay valid.
    pub fn clear_constraint(&mut self, index: usize) {
        self.change_constraint(index, LinearExpr::new(), f64::NEG_INFINITY, f64::INFINITY);
    }

    /// The linear objective, if any.
    pub fn objective(&self) -> Option<&RelObjective> {
        self.objective.as_ref()
    }

    /// Replace the objective.
    pub fn new_objective(&mut self, linear: LinearExpr, constant: f64) {
        self.objective = Some(RelObjective { linear, constant });
    }

    /// Drop the objective.
    pub fn remove_objective(&mut self) -> Option<RelObjective> {
        self.objective.take()
    }

    /// Objective value at `x` (zero without an objective).
    pub fn obj_value(&self, x: &[f64]) -> f64 {
        self.objective
            .as_ref()
            .map_or(0.0, |o| o.linear.eval(x) + o.constant)
    }

    /// Export the constraint coefficients as a CSC matrix for MILP engine
    /// implementors. Row `i` is constraint `i`; cleared rows are empty.
    pub fn to_csc(&self) -> CsMat<f64> {
        let m = self.cons.len();
        let n = self.vars.len();
        let mut tri = TriMat::new((m, n));
        for c in &self.cons {
            if let Some(lf) = &c.function.linear {
                for (j, a) in lf.iter() {
                    tri.add_triplet(c.index, j, a);
                }
            }
        }
        tri.to_csc()
    }
}
