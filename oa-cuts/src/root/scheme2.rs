//! RS2: neighbourhood scan around the NLP point.
//!
//! Walks outward from the NLP point along the nonlinear variable in both
//! directions. A tangent is emitted whenever the slope has changed by more
//! than the configured percentage since the last cut; otherwise the step
//! doubles.

use oa_core::{LinearExpr, Relaxation};

use super::{RootCutGenerator, UniVar};

impl RootCutGenerator<'_> {
    /// Run RS2 on one admissible constraint.
    pub(crate) fn root_lin_scheme2(&mut self, rel: &mut Relaxation, con_idx: usize, uv: UniVar) {
        let UniVar {
            l_idx,
            l_coeff,
            n_idx,
            ..
        } = uv;
        let con = self.minlp.con(con_idx);
        let n = rel.num_vars();

        let Ok(grad) = con.function.gradient(&self.nlpx, n) else {
            log::error!("gradient not defined at the NLP point");
            return;
        };
        let nlp_slope = -grad[n_idx] / l_coeff;

        let (v_lb, v_ub) = {
            let v = rel.var(n_idx);
            (v.lb, v.ub)
        };
        let x0 = self.nlpx[n_idx];
        // The probe point is zero except the swept coordinate; the linear
        // variable cancels from the tangent.
        let mut npt = vec![0.0; n];

        // Downward sweep.
        let nbh = v_lb.max(x0 - self.rs2_nbh);
        let mut delta = if x0 - nbh >= 1.0 { 0.5 } else { x0 - nbh };
        let mut last_slope = nlp_slope;
        if delta != 0.0 {
            npt[n_idx] = x0 - delta;
            while npt[n_idx] >= nbh {
                self.scheme2_cut(rel, con_idx, &mut delta, l_coeff, &mut last_slope, n_idx, &npt);
                npt[n_idx] -= delta;
            }
        }

        // Upward sweep.
        let nbh = v_ub.min(x0 + self.rs2_nbh);
        let mut delta = if nbh - x0 >= 1.0 { 0.5 } else { nbh - x0 };
        let mut last_slope = nlp_slope;
        if delta != 0.0 {
            npt[n_idx] = x0 + delta;
            while npt[n_idx] <= nbh {
                self.scheme2_cut(rel, con_idx, &mut delta, l_coeff, &mut last_slope, n_idx, &npt);
                npt[n_idx] += delta;
            }
        }
    }

    /// Emit a tangent at the probe point unless the slope barely moved, in
    /// which case the step doubles and no cut is produced.
    #[allow(clippy::too_many_arguments)]
    fn scheme2_cut(
        &mut self,
        rel: &mut Relaxation,
        con_idx: usize,
        delta: &mut f64,
        l_coeff: f64,
        last_slope: &mut f64,
        n_idx: usize,
        npt: &[f64],
    ) {
        let con = self.minlp.con(con_idx);
        let Ok(grad) = con.function.gradient(npt, rel.num_vars()) else {
            return;
        };
        let new_slope = -grad[n_idx] / l_coeff;

        let flat = (*last_slope == 0.0 && new_slope == 0.0)
            || (*last_slope != 0.0
                && ((new_slope - *last_slope) / *last_slope).abs() * 100.0 < self.rs2_per);
        if flat {
            *delta *= 2.0;
            return;
        }
        *last_slope = new_slope;

        let Ok(act) = con.activity(npt) else {
            return;
        };
        let lf = LinearExpr::from_dense(&grad, self.coeff_tol);
        let c = act - npt.iter().zip(&grad).map(|(x, a)| x * a).sum::<f64>();

        self.stats.rs2_cuts += 1;
        let name = format!("_OAcut_{}_AtRoot", self.stats.rs2_cuts);
        rel.new_linear_constraint(lf, f64::NEG_INFINITY, con.ub - c, &name);
    }
}
