//! The mutable problem arena.
//!
//! A `Problem` owns dense vectors of variables and constraints; entities
//! refer to each other by index. Cloning a problem copies both arenas while
//! sharing the opaque nonlinear oracles.

use crate::error::EvalError;
use crate::model::constraint::Constraint;
use crate::model::function::{Function, FunctionType, LinearExpr};
use crate::model::variable::{FunType, VarType, Variable};

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjSense {
    /// Minimize the objective.
    Minimize,

    /// Maximize the objective.
    Maximize,
}

/// The problem objective.
#[derive(Debug, Clone)]
pub struct Objective {
    /// Objective body.
    pub function: Function,

    /// Additive constant.
    pub constant: f64,

    /// Optimization direction.
    pub sense: ObjSense,
}

/// A mutable optimization problem.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    vars: Vec<Variable>,
    cons: Vec<Constraint>,
    objective: Option<Objective>,
    marked: Vec<usize>,
    next_id: u32,
}

impl Problem {
    /// Empty problem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Number of constraints.
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

    /// Add a constraint; returns its index. Variables appearing in the
    /// quadratic or nonlinear part are tagged nonlinear.
    pub fn new_constraint(&mut self, function: Function, lb: f64, ub: f64, name: &str) -> usize {
        if let Some(qf) = &function.quadratic {
            for v in qf.vars() {
                self.vars[v].ftype = FunType::Nonlinear;
            }
        }
        if let Some(nlf) = &function.nonlinear {
            for &v in nlf.vars() {
                self.vars[v].ftype = FunType::Nonlinear;
            }
        }
        let index = self.cons.len();
        self.cons.push(Constraint {
            index,
            name: name.to_string(),
            function,
            lb,
            ub,
        });
        index
    }

    /// Replace a constraint's linear part and bounds, keeping any quadratic
    /// and nonlinear parts.
    pub fn change_constraint(&mut self, index: usize, lin: LinearExpr, lb: f64, ub: f64) {
        let c = &mut self.cons[index];
        c.function.linear = if lin.is_empty() { None } else { Some(lin) };
        c.lb = lb;
        c.ub = ub;
    }

    /// Reverse the sense of a constraint: `lb <= f` becomes `-f <= -lb`.
    pub fn reverse_sense(&mut self, index: usize) {
        let c = &mut self.cons[index];
        c.function.negate();
        let (lb, ub) = (c.lb, c.ub);
        c.lb = -ub;
        c.ub = -lb;
    }

    /// Mark a constraint for deletion.
    pub fn mark_delete(&mut self, index: usize) {
        self.marked.push(index);
    }

    /// Remove all marked constraints and restore dense indices.
    pub fn del_marked_cons(&mut self) {
        if self.marked.is_empty() {
            return;
        }
        let mut dead = std::mem::take(&mut self.marked);
        dead.sort_unstable();
        dead.dedup();
        self.cons.retain(|c| dead.binary_search(&c.index).is_err());
        for (k, c) in self.cons.iter_mut().enumerate() {
            c.index = k;
        }
    }

    /// Set a variable's semantic type.
    pub fn set_var_type(&mut self, index: usize, vtype: VarType) {
        self.vars[index].vtype = vtype;
    }

    /// Set a variable's bounds.
    pub fn set_var_bounds(&mut self, index: usize, lb: f64, ub: f64) {
        self.vars[index].lb = lb;
        self.vars[index].ub = ub;
    }

    /// The objective, if any.
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Replace the objective.
    pub fn new_objective(&mut self, function: Function, constant: f64, sense: ObjSense) {
        self.objective = Some(Objective {
            function,
            constant,
            sense,
        });
    }

    /// Drop the objective, returning it.
    pub fn remove_objective(&mut self) -> Option<Objective> {
        self.objective.take()
    }

    /// Negate the objective and flip its sense.
    pub fn negate_objective(&mut self) {
        if let Some(o) = &mut self.objective {
            o.function.negate();
            o.constant = -o.constant;
            o.sense = match o.sense {
                ObjSense::Minimize => ObjSense::Maximize,
                ObjSense::Maximize => ObjSense::Minimize,
            };
        }
    }

    /// Objective value at `x` (zero if there is no objective).
    pub fn obj_value(&self, x: &[f64]) -> Result<f64, EvalError> {
        match &self.objective {
            Some(o) => Ok(o.function.eval(x)? + o.constant),
            None => Ok(0.0),
        }
    }

    /// Classification of the objective body.
    pub fn obj_ftype(&self) -> FunctionType {
        self.objective
            .as_ref()
            .map_or(FunctionType::Constant, |o| o.function.ftype())
    }
}

/// A reversible variable-bound modification.
///
/// Captures the previous bounds on construction so that `undo` restores the
/// problem bit for bit. Used by the OA handler to fix integer variables for
/// a continuous subproblem and by branchers.
#[derive(Debug, Clone, Copy)]
pub struct VarBoundMod {
    /// Variable index.
    pub var: usize,

    /// Bounds before the modification.
    pub old_lb: f64,

    /// Bounds before the modification.
    pub old_ub: f64,

    /// Bounds after the modification.
    pub new_lb: f64,

    /// Bounds after the modification.
    pub new_ub: f64,
}

impl VarBoundMod {
    /// A modification fixing `var` to `val`.
    pub fn fix(p: &Problem, var: usize, val: f64) -> Self {
        let v = p.var(var);
        Self {
            var,
            old_lb: v.lb,
            old_ub: v.ub,
            new_lb: val,
            new_ub: val,
        }
    }

    /// Apply the new bounds to the problem.
    pub fn apply(&self, p: &mut Problem) {
        p.set_var_bounds(self.var, self.new_lb, self.new_ub);
    }

    /// Restore the previous bounds.
    pub fn undo(&self, p: &mut Problem) {
        p.set_var_bounds(self.var, self.old_lb, self.old_ub);
    }
}
