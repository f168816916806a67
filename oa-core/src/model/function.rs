//! Functions: sums of linear, quadratic and opaque nonlinear parts.

use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;

/// Classification of a function.
///
/// Ordered from simplest to hardest; the type of a sum is the maximum over
/// its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FunctionType {
    /// No terms at all.
    Constant,

    /// Only linear terms.
    Linear,

    /// Linear plus quadratic terms.
    Quadratic,

    /// Contains an opaque nonlinear part.
    Nonlinear,
}

/// A sparse linear expression: sum of `coeff * x[index]` terms.
///
/// Terms are kept sorted by variable index with at most one term per
/// variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(usize, f64)>,
}

impl LinearExpr {
    /// Empty expression.
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Build from `(index, coeff)` pairs. Pairs need not be sorted;
    /// duplicate indices are summed.
    pub fn from_terms(pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut e = Self::new();
        for (idx, c) in pairs {
            e.add_term(idx, c);
        }
        e
    }

    /// Build from a dense coefficient slice, dropping entries with
    /// `|a_i| < coeff_tol`.
    pub fn from_dense(dense: &[f64], coeff_tol: f64) -> Self {
        let terms = dense
            .iter()
            .enumerate()
            .filter(|(_, a)| a.abs() >= coeff_tol)
            .map(|(i, a)| (i, *a))
            .collect();
        Self { terms }
    }

    /// Add `coeff * x[index]`, merging with an existing term if present.
    /// A term whose coefficient becomes zero is removed.
    pub fn add_term(&mut self, index: usize, coeff: f64) {
        match self.terms.binary_search_by_key(&index, |t| t.0) {
            Ok(pos) => {
                self.terms[pos].1 += coeff;
                if self.terms[pos].1 == 0.0 {
                    self.terms.remove(pos);
                }
            }
            Err(pos) => self.terms.insert(pos, (index, coeff)),
        }
    }

    /// Coefficient of a variable (zero if absent).
    pub fn coeff(&self, index: usize) -> f64 {
        match self.terms.binary_search_by_key(&index, |t| t.0) {
            Ok(pos) => self.terms[pos].1,
            Err(_) => 0.0,
        }
    }

    /// Evaluate at a point.
    pub fn eval(&self, x: &[f64]) -> f64 {
        self.terms.iter().map(|&(i, c)| c * x[i]).sum()
    }

    /// Multiply all coefficients in place.
    pub fn scale(&mut self, factor: f64) {
        for t in &mut self.terms {
            t.1 *= factor;
        }
    }

    /// Negate all coefficients in place.
    pub fn negate(&mut self) {
        self.scale(-1.0);
    }

    /// Iterate `(index, coeff)` terms in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.terms.iter().copied()
    }

    /// Number of stored terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Whether the expression has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Add the coefficients into a dense gradient accumulator.
    pub fn add_gradient(&self, grad: &mut [f64]) {
        for &(i, c) in &self.terms {
            grad[i] += c;
        }
    }
}

/// A quadratic expression: sum of `coeff * x[i] * x[j]` terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadExpr {
    terms: Vec<(usize, usize, f64)>,
}

impl QuadExpr {
    /// Build from `(i, j, coeff)` triplets.
    pub fn from_terms(triplets: impl IntoIterator<Item = (usize, usize, f64)>) -> Self {
        Self {
            terms: triplets.into_iter().collect(),
        }
    }

    /// Evaluate at a point.
    pub fn eval(&self, x: &[f64]) -> f64 {
        self.terms.iter().map(|&(i, j, c)| c * x[i] * x[j]).sum()
    }

    /// Accumulate the gradient at `x` into `grad`.
    pub fn add_gradient(&self, x: &[f64], grad: &mut [f64]) {
        for &(i, j, c) in &self.terms {
            grad[i] += c * x[j];
            grad[j] += c * x[i];
        }
    }

    /// Multiply all coefficients in place.
    pub fn scale(&mut self, factor: f64) {
        for t in &mut self.terms {
            t.2 *= factor;
        }
    }

    /// Indices of the variables appearing in quadratic terms, deduplicated.
    pub fn vars(&self) -> Vec<usize> {
        let mut v: Vec<usize> = self.terms.iter().flat_map(|&(i, j, _)| [i, j]).collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// Number of stored terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }
}

/// Opaque nonlinear oracle: point and gradient evaluation.
///
/// Derivative computation stays outside the core; implementors typically
/// wrap an expression graph or AD tape.
pub trait NonlinearOracle: Send + Sync {
    /// Evaluate at `x`.
    fn eval(&self, x: &[f64]) -> Result<f64, EvalError>;

    /// Accumulate the gradient at `x` into `grad` (dense, problem-sized).
    fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), EvalError>;

    /// Indices of the variables the oracle depends on.
    fn vars(&self) -> &[usize];
}

/// Oracle wrapper that negates another oracle.
///
/// Used when a maximization objective with a nonlinear part is converted to
/// minimization.
pub struct NegatedOracle {
    inner: Arc<dyn NonlinearOracle>,
}

impl NegatedOracle {
    /// Wrap an oracle.
    pub fn new(inner: Arc<dyn NonlinearOracle>) -> Self {
        Self { inner }
    }
}

impl NonlinearOracle for NegatedOracle {
    fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        self.inner.eval(x).map(|v| -v)
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), EvalError> {
        let mut g = vec![0.0; grad.len()];
        self.inner.gradient(x, &mut g)?;
        for (out, gi) in grad.iter_mut().zip(g) {
            *out -= gi;
        }
        Ok(())
    }

    fn vars(&self) -> &[usize] {
        self.inner.vars()
    }
}

/// A function: sum of optional linear, quadratic and nonlinear parts.
#[derive(Clone, Default)]
pub struct Function {
    /// Linear part.
    pub linear: Option<LinearExpr>,

    /// Quadratic part.
    pub quadratic: Option<QuadExpr>,

    /// Opaque nonlinear part. Shared between clones of a problem.
    pub nonlinear: Option<Arc<dyn NonlinearOracle>>,
}

impl Function {
    /// A function consisting of a linear expression only.
    pub fn from_linear(lin: LinearExpr) -> Self {
        Self {
            linear: Some(lin),
            ..Default::default()
        }
    }

    /// A function with linear and quadratic parts.
    pub fn from_quadratic(qf: QuadExpr, lin: Option<LinearExpr>) -> Self {
        Self {
            linear: lin,
            quadratic: Some(qf),
            nonlinear: None,
        }
    }

    /// A function with an opaque nonlinear part.
    pub fn from_nonlinear(nlf: Arc<dyn NonlinearOracle>, lin: Option<LinearExpr>) -> Self {
        Self {
            linear: lin,
            quadratic: None,
            nonlinear: Some(nlf),
        }
    }

    /// Classification of this function.
    pub fn ftype(&self) -> FunctionType {
        if self.nonlinear.is_some() {
            FunctionType::Nonlinear
        } else if self.quadratic.as_ref().is_some_and(|q| q.num_terms() > 0) {
            FunctionType::Quadratic
        } else if self.linear.as_ref().is_some_and(|l| !l.is_empty()) {
            FunctionType::Linear
        } else {
            FunctionType::Constant
        }
    }

    /// Evaluate at a point.
    pub fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        let mut val = 0.0;
        if let Some(nlf) = &self.nonlinear {
            val += nlf.eval(x)?;
        }
        if let Some(qf) = &self.quadratic {
            val += qf.eval(x);
        }
        if let Some(lf) = &self.linear {
            val += lf.eval(x);
        }
        Ok(val)
    }

    /// Dense gradient at a point, of length `n`.
    pub fn gradient(&self, x: &[f64], n: usize) -> Result<Vec<f64>, EvalError> {
        let mut grad = vec![0.0; n];
        if let Some(nlf) = &self.nonlinear {
            nlf.gradient(x, &mut grad)?;
        }
        if let Some(qf) = &self.quadratic {
            qf.add_gradient(x, &mut grad);
        }
        if let Some(lf) = &self.linear {
            lf.add_gradient(&mut grad);
        }
        Ok(grad)
    }

    /// Negate the function in place; the nonlinear part is wrapped.
    pub fn negate(&mut self) {
        if let Some(lf) = &mut self.linear {
            lf.negate();
        }
        if let Some(qf) = &mut self.quadratic {
            qf.scale(-1.0);
        }
        if let Some(nlf) = self.nonlinear.take() {
            self.nonlinear = Some(Arc::new(NegatedOracle::new(nlf)));
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("linear", &self.linear)
            .field("quadratic", &self.quadratic)
            .field("nonlinear", &self.nonlinear.as_ref().map(|n| n.vars()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// f(x) = x[k]^2 as an opaque oracle.
    struct Square {
        vars: [usize; 1],
    }

    impl NonlinearOracle for Square {
        fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
            Ok(x[self.vars[0]] * x[self.vars[0]])
        }

        fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), EvalError> {
            grad[self.vars[0]] += 2.0 * x[self.vars[0]];
            Ok(())
        }

        fn vars(&self) -> &[usize] {
            &self.vars
        }
    }

    #[test]
    fn test_linear_expr_eval_and_coeff() {
        let lf = LinearExpr::from_terms([(2, 3.0), (0, 1.0)]);
        assert_eq!(lf.coeff(0), 1.0);
        assert_eq!(lf.coeff(1), 0.0);
        assert_eq!(lf.coeff(2), 3.0);
        assert_eq!(lf.eval(&[2.0, 5.0, 1.0]), 5.0);
    }

    #[test]
    fn test_from_dense_drops_small_coefficients() {
        let lf = LinearExpr::from_dense(&[1.0, 1e-9, -2.0, 0.0], 1e-6);
        assert_eq!(lf.num_terms(), 2);
        assert_eq!(lf.coeff(0), 1.0);
        assert_eq!(lf.coeff(1), 0.0);
        assert_eq!(lf.coeff(2), -2.0);
    }

    #[test]
    fn test_add_term_merges_and_cancels() {
        let mut lf = LinearExpr::from_terms([(0, 1.0)]);
        lf.add_term(0, 2.0);
        assert_eq!(lf.coeff(0), 3.0);
        lf.add_term(0, -3.0);
        assert!(lf.is_empty());
    }

    #[test]
    fn test_quad_eval_and_gradient() {
        // 2*x0*x1 + x1^2
        let qf = QuadExpr::from_terms([(0, 1, 2.0), (1, 1, 1.0)]);
        let x = [3.0, 4.0];
        assert_eq!(qf.eval(&x), 24.0 + 16.0);

        let mut grad = vec![0.0; 2];
        qf.add_gradient(&x, &mut grad);
        assert_eq!(grad[0], 8.0);
        assert_eq!(grad[1], 6.0 + 8.0);
        assert_eq!(qf.vars(), vec![0, 1]);
    }

    #[test]
    fn test_function_type_classification() {
        assert_eq!(Function::default().ftype(), FunctionType::Constant);
        assert_eq!(
            Function::from_linear(LinearExpr::from_terms([(0, 1.0)])).ftype(),
            FunctionType::Linear
        );
        assert_eq!(
            Function::from_quadratic(QuadExpr::from_terms([(0, 0, 1.0)]), None).ftype(),
            FunctionType::Quadratic
        );
        let f = Function::from_nonlinear(Arc::new(Square { vars: [0] }), None);
        assert_eq!(f.ftype(), FunctionType::Nonlinear);
        assert!(FunctionType::Linear < FunctionType::Nonlinear);
    }

    #[test]
    fn test_function_eval_and_gradient_sum_parts() {
        // f = x0^2 + 3*x0*x1 + 2*x1
        let f = Function {
            linear: Some(LinearExpr::from_terms([(1, 2.0)])),
            quadratic: Some(QuadExpr::from_terms([(0, 1, 3.0)])),
            nonlinear: Some(Arc::new(Square { vars: [0] })),
        };
        let x = [2.0, 1.0];
        assert_eq!(f.eval(&x).unwrap(), 4.0 + 6.0 + 2.0);

        let grad = f.gradient(&x, 2).unwrap();
        assert_eq!(grad[0], 4.0 + 3.0);
        assert_eq!(grad[1], 6.0 + 2.0);
    }

    #[test]
    fn test_negate_wraps_oracle() {
        let mut f = Function::from_nonlinear(
            Arc::new(Square { vars: [0] }),
            Some(LinearExpr::from_terms([(0, 1.0)])),
        );
        f.negate();
        assert_eq!(f.eval(&[3.0]).unwrap(), -9.0 - 3.0);
        let grad = f.gradient(&[3.0], 1).unwrap();
        assert_eq!(grad[0], -6.0 - 1.0);
    }
}
