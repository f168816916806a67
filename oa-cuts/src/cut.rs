//! Cuts: valid inequalities with lifecycle counters and scores.

use oa_core::{is_active_at, EvalError, Function, LinearExpr, Relaxation};

/// Where a cut currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutMembership {
    /// Attached to the relaxation as a constraint.
    Relaxation,

    /// Parked in the pool.
    Pool,
}

/// Lifecycle counters, scores and policy flags of a cut.
///
/// Counters are plain integers; the core is single-threaded and all
/// transitions are gated by the handler that owns the cut.
#[derive(Debug, Clone)]
pub struct CutInfo {
    /// Times the cut was moved from the pool into the relaxation.
    pub times_enabled: u32,

    /// Times the cut was removed from the relaxation.
    pub times_disabled: u32,

    /// Iterations since the cut was last enabled.
    pub last_enabled: u32,

    /// Iterations since the cut was last disabled.
    pub last_disabled: u32,

    /// Iterations since the cut was active; tracked while enabled.
    pub cnt_since_active: u32,

    /// Iterations since the cut was violated; tracked while pooled.
    pub cnt_since_viol: u32,

    /// Times the cut was active in the relaxation.
    pub num_active: u32,

    /// Cuts active in a node with unprocessed children.
    pub parent_active_cnts: i32,

    /// Deterministic hash over the linear coefficients.
    pub hash: u64,

    /// Score recomputed from the current point.
    pub var_score: f64,

    /// Score fixed at construction.
    pub fixed_score: f64,

    /// Never reclaim this cut from the pool.
    pub never_delete: bool,

    /// Never remove this cut from the relaxation.
    pub never_disable: bool,

    /// Current membership.
    pub membership: CutMembership,
}

/// A valid inequality `lb <= f(x) <= ub`.
///
/// Cuts are feasible-safe: disabling one never shrinks the relaxation's
/// feasible region below the true feasible region.
#[derive(Debug, Clone)]
pub struct Cut {
    f: Function,
    lb: f64,
    ub: f64,
    n: usize,
    cons: Option<usize>,
    name: String,
    info: CutInfo,
}

/// Hash over the rounded linear coefficients:
/// `sum((i + 1) * round(a_i)) mod 2^31`. Stable across runs; used for pool
/// de-duplication. The 1-based weight keeps the first variable's
/// coefficient in the mix.
fn coeff_hash(lf: &LinearExpr) -> u64 {
    const MODULUS: i64 = 1 << 31;
    let mut h: i64 = 0;
    for (i, a) in lf.iter() {
        let r = a.round();
        if r.abs() < MODULUS as f64 {
            h = (h + (i as i64 + 1).wrapping_mul(r as i64)).rem_euclid(MODULUS);
        }
    }
    h as u64
}

impl Cut {
    /// Create a cut over a problem with `n` variables.
    pub fn new(n: usize, f: Function, lb: f64, ub: f64, never_delete: bool, never_disable: bool) -> Self {
        let hash = f.linear.as_ref().map_or(0, coeff_hash);
        let fixed_score = Self::fixed_score_of(&f);
        Self {
            f,
            lb,
            ub,
            n,
            cons: None,
            name: String::new(),
            info: CutInfo {
                times_enabled: 0,
                times_disabled: 0,
                last_enabled: 0,
                last_disabled: 0,
                cnt_since_active: 0,
                cnt_since_viol: 0,
                num_active: 0,
                parent_active_cnts: 0,
                hash,
                var_score: 0.0,
                fixed_score,
                never_delete,
                never_disable,
                membership: CutMembership::Pool,
            },
        }
    }

    /// Sparser cuts get the higher fixed score.
    fn fixed_score_of(f: &Function) -> f64 {
        let nnz = f.linear.as_ref().map_or(0, |lf| lf.num_terms());
        1.0 / (1.0 + nnz as f64)
    }

    /// Set the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cut body.
    pub fn function(&self) -> &Function {
        &self.f
    }

    /// Lower bound.
    pub fn lb(&self) -> f64 {
        self.lb
    }

    /// Upper bound.
    pub fn ub(&self) -> f64 {
        self.ub
    }

    /// Ambient variable count the hash was computed over.
    pub fn num_vars(&self) -> usize {
        self.n
    }

    /// Constraint index while enabled, `None` while pooled.
    pub fn constraint(&self) -> Option<usize> {
        self.cons
    }

    /// Cut info record.
    pub fn info(&self) -> &CutInfo {
        &self.info
    }

    /// Mutable cut info record.
    pub fn info_mut(&mut self) -> &mut CutInfo {
        &mut self.info
    }

    /// Activity of the cut at `x`.
    pub fn eval(&self, x: &[f64]) -> Result<f64, EvalError> {
        self.f.eval(x)
    }

    /// Violation of the cut at `x` and the resulting score
    /// (`fixed_score` plus the violation term). The score composition is
    /// the only policy the pool reads.
    pub fn eval_score(&self, x: &[f64]) -> Result<(f64, f64), EvalError> {
        let act = self.f.eval(x)?;
        let vio = (act - self.ub).max(0.0) + (self.lb - act).max(0.0);
        Ok((vio, self.info.fixed_score + vio))
    }

    /// Attach the cut to the relaxation as a constraint and cache the
    /// handle.
    pub fn apply_to_relaxation(&mut self, rel: &mut Relaxation) -> usize {
        let lin = self.f.linear.clone().unwrap_or_default();
        let idx = rel.new_linear_constraint(lin, self.lb, self.ub, &self.name);
        self.cons = Some(idx);
        self.info.membership = CutMembership::Relaxation;
        self.info.times_enabled += 1;
        self.info.last_enabled = 0;
        idx
    }

    /// Detach the cut from the relaxation, clearing its row in place, and
    /// park it in the pool. No-op for `never_disable` cuts.
    pub fn disable(&mut self, rel: &mut Relaxation) {
        if self.info.never_disable {
            return;
        }
        if let Some(idx) = self.cons.take() {
            rel.clear_constraint(idx);
            self.info.membership = CutMembership::Pool;
            self.info.times_disabled += 1;
            self.info.last_disabled = 0;
            self.info.cnt_since_viol = 0;
        }
    }

    /// Update the per-iteration counters from the point `x`.
    pub fn update_counters(&mut self, x: &[f64], abs_tol: f64, rel_tol: f64) {
        self.info.last_enabled = self.info.last_enabled.saturating_add(1);
        self.info.last_disabled = self.info.last_disabled.saturating_add(1);
        let Ok(act) = self.eval(x) else {
            return;
        };
        let vio = (act - self.ub).max(0.0) + (self.lb - act).max(0.0);
        self.info.var_score = self.info.fixed_score + vio;
        match self.info.membership {
            CutMembership::Relaxation => {
                if is_active_at(act, self.ub, abs_tol, rel_tol)
                    || (self.lb.is_finite() && is_active_at(act, self.lb, abs_tol, rel_tol))
                {
                    self.info.num_active += 1;
                    self.info.cnt_since_active = 0;
                } else {
                    self.info.cnt_since_active += 1;
                }
            }
            CutMembership::Pool => {
                if vio > 0.0 {
                    self.info.cnt_since_viol = 0;
                } else {
                    self.info.cnt_since_viol += 1;
                }
            }
        }
    }
}
