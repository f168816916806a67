//! Cut pool: storage, de-duplication and purging of generated cuts.

use oa_core::Relaxation;

use crate::cut::{Cut, CutMembership};

/// Cut pool settings.
#[derive(Debug, Clone)]
pub struct CutPoolSettings {
    /// Maximum number of pooled (disabled) cuts kept across purges.
    pub max_pooled: usize,

    /// Disable an enabled cut after this many consecutive inactive
    /// iterations.
    pub max_inactive: u32,

    /// Absolute feasibility tolerance for activity tracking.
    pub feas_abs_tol: f64,

    /// Relative feasibility tolerance for activity tracking.
    pub feas_rel_tol: f64,
}

impl Default for CutPoolSettings {
    fn default() -> Self {
        Self {
            max_pooled: 5000,
            max_inactive: 50,
            feas_abs_tol: 1e-6,
            feas_rel_tol: 1e-6,
        }
    }
}

/// Statistics for the cut pool.
#[derive(Debug, Default, Clone)]
pub struct CutPoolStats {
    /// Total cuts added.
    pub total_added: usize,

    /// Insertions rejected as duplicates.
    pub duplicates: usize,

    /// Cuts reclaimed by purging.
    pub total_purged: usize,
}

/// Owns every cut generated during a solve, in the relaxation or parked in
/// the pool.
#[derive(Default)]
pub struct CutPool {
    cuts: Vec<Cut>,
    settings: CutPoolSettings,
    stats: CutPoolStats,
}

impl CutPool {
    /// Create a pool.
    pub fn new(settings: CutPoolSettings) -> Self {
        Self {
            cuts: Vec::new(),
            settings,
            stats: CutPoolStats::default(),
        }
    }

    /// Add a cut, de-duplicating on the coefficient hash.
    ///
    /// Returns the slot of the cut and whether it was a duplicate of an
    /// existing one.
    pub fn add(&mut self, cut: Cut) -> (usize, bool) {
        if let Some(pos) = self
            .cuts
            .iter()
            .position(|c| c.info().hash == cut.info().hash && c.ub() == cut.ub() && c.lb() == cut.lb())
        {
            self.stats.duplicates += 1;
            return (pos, true);
        }
        self.cuts.push(cut);
        self.stats.total_added += 1;
        (self.cuts.len() - 1, false)
    }

    /// Enable a pooled cut: attach it to the relaxation.
    pub fn enable(&mut self, slot: usize, rel: &mut Relaxation) -> Option<usize> {
        let cut = &mut self.cuts[slot];
        if cut.info().membership == CutMembership::Relaxation {
            return cut.constraint();
        }
        Some(cut.apply_to_relaxation(rel))
    }

    /// Disable an enabled cut, honoring `never_disable`.
    pub fn disable(&mut self, slot: usize, rel: &mut Relaxation) {
        self.cuts[slot].disable(rel);
    }

    /// Update per-iteration counters at the current relaxation point and
    /// park cuts that stayed inactive too long.
    pub fn sync(&mut self, x: &[f64], rel: &mut Relaxation) {
        let abs = self.settings.feas_abs_tol;
        let relt = self.settings.feas_rel_tol;
        for cut in &mut self.cuts {
            cut.update_counters(x, abs, relt);
        }
        let stale: Vec<usize> = self
            .cuts
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.info().membership == CutMembership::Relaxation
                    && !c.info().never_disable
                    && c.info().cnt_since_active >= self.settings.max_inactive
            })
            .map(|(i, _)| i)
            .collect();
        for slot in stale {
            self.disable(slot, rel);
        }
    }

    /// Reclaim pooled cuts beyond the capacity bound, lowest score first.
    /// Cuts flagged `never_delete` survive.
    pub fn purge(&mut self) {
        let pooled = self
            .cuts
            .iter()
            .filter(|c| c.info().membership == CutMembership::Pool && !c.info().never_delete)
            .count();
        if pooled <= self.settings.max_pooled {
            return;
        }
        let mut scored: Vec<(usize, f64)> = self
            .cuts
            .iter()
            .enumerate()
            .filter(|(_, c)| c.info().membership == CutMembership::Pool && !c.info().never_delete)
            .map(|(i, c)| (i, c.info().var_score))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        let excess = pooled - self.settings.max_pooled;
        let mut drop: Vec<usize> = scored.iter().take(excess).map(|(i, _)| *i).collect();
        drop.sort_unstable();
        for (removed, slot) in drop.into_iter().enumerate() {
            self.cuts.remove(slot - removed);
            self.stats.total_purged += 1;
        }
        log::debug!("cut pool purged {excess} cuts");
    }

    /// Cut by slot.
    pub fn get(&self, slot: usize) -> &Cut {
        &self.cuts[slot]
    }

    /// Mutable cut by slot.
    pub fn get_mut(&mut self, slot: usize) -> &mut Cut {
        &mut self.cuts[slot]
    }

    /// Iterate cuts currently in the relaxation.
    pub fn enabled(&self) -> impl Iterator<Item = &Cut> {
        self.cuts
            .iter()
            .filter(|c| c.info().membership == CutMembership::Relaxation)
    }

    /// Number of cuts owned, enabled or pooled.
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Whether the pool owns no cuts.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Pool statistics.
    pub fn stats(&self) -> &CutPoolStats {
        &self.stats
    }
}
