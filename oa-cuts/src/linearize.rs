//! Linear supports of nonlinear functions.

use oa_core::{EvalError, Function, LinearExpr};

/// Build the affine support of `f` at `x`: the pair `(a, c)` with
/// `a = grad f(x)` and `c = f(x) - a . x`, so that `a . y + c` is the
/// first-order expansion of `f` around `x`.
///
/// Coefficients with magnitude below `coeff_tol` are dropped. `n` is the
/// gradient length (the ambient variable count); `x` may be longer when the
/// relaxation carries auxiliary variables past the source problem's.
///
/// Fails when the gradient oracle fails; the caller drops the
/// linearization and moves on.
pub fn linear_at(
    f: &Function,
    fval: f64,
    x: &[f64],
    n: usize,
    coeff_tol: f64,
) -> Result<(LinearExpr, f64), EvalError> {
    let grad = f.gradient(x, n).inspect_err(|_| {
        log::error!("gradient not defined at this point");
    })?;
    let lf = LinearExpr::from_dense(&grad, coeff_tol);
    let c = fval - inner_product(x, &grad);
    Ok((lf, c))
}

fn inner_product(x: &[f64], a: &[f64]) -> f64 {
    x.iter().zip(a).map(|(xi, ai)| xi * ai).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use oa_core::{NonlinearOracle, QuadExpr};

    /// f(x, y) = x^2 - y, with an oracle that fails for x < 0.
    struct HalfParabola {
        vars: [usize; 2],
    }

    impl NonlinearOracle for HalfParabola {
        fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
            if x[0] < 0.0 {
                return Err(EvalError);
            }
            Ok(x[0] * x[0] - x[1])
        }

        fn gradient(&self, x: &[f64], grad: &mut [f64]) -> Result<(), EvalError> {
            if x[0] < 0.0 {
                return Err(EvalError);
            }
            grad[0] += 2.0 * x[0];
            grad[1] += -1.0;
            Ok(())
        }

        fn vars(&self) -> &[usize] {
            &self.vars
        }
    }

    #[test]
    fn test_support_matches_function_value_at_point() {
        // f = x^2 - y at (2, 1): a = (4, -1), c = 3 - (8 - 1) = -4
        let f = Function::from_quadratic(QuadExpr::from_terms([(0, 0, 1.0)]), None);
        let f = Function {
            linear: Some(LinearExpr::from_terms([(1, -1.0)])),
            ..f
        };
        let x = [2.0, 1.0];
        let fval = f.eval(&x).unwrap();
        let (lf, c) = linear_at(&f, fval, &x, 2, 1e-6).unwrap();

        assert_relative_eq!(lf.coeff(0), 4.0);
        assert_relative_eq!(lf.coeff(1), -1.0);
        assert_relative_eq!(lf.eval(&x) + c, fval);
    }

    #[test]
    fn test_small_coefficients_are_dropped() {
        let f = Function::from_linear(LinearExpr::from_terms([(0, 1.0), (1, 1e-9)]));
        let (lf, _) = linear_at(&f, 0.0, &[0.0, 0.0], 2, 1e-6).unwrap();
        assert_eq!(lf.num_terms(), 1);
        assert_eq!(lf.coeff(1), 0.0);
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let f = Function::from_nonlinear(
            std::sync::Arc::new(HalfParabola { vars: [0, 1] }),
            None,
        );
        assert!(linear_at(&f, 0.0, &[-1.0, 0.0], 2, 1e-6).is_err());
    }
}
