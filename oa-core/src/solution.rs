//! Solutions and the append-only solution pool.

/// A primal solution with its objective value.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Objective value.
    pub objective: f64,

    /// Primal point.
    pub x: Vec<f64>,
}

impl Solution {
    /// Create a solution.
    pub fn new(objective: f64, x: Vec<f64>) -> Self {
        Self { objective, x }
    }
}

/// Append-only pool of feasible solutions.
///
/// The OA handler pushes every feasible fixed-integer NLP solution here; the
/// driver reads the best one as the incumbent.
#[derive(Debug, Clone, Default)]
pub struct SolutionPool {
    sols: Vec<Solution>,
    best: Option<usize>,
}

impl SolutionPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a solution; returns true if it became the best one.
    pub fn add(&mut self, sol: Solution) -> bool {
        let improved = match self.best {
            Some(b) => sol.objective < self.sols[b].objective,
            None => true,
        };
        self.sols.push(sol);
        if improved {
            let idx = self.sols.len() - 1;
            self.best = Some(idx);
            log::debug!(
                "solution pool: new best objective {:.6e}",
                self.sols[idx].objective
            );
        }
        improved
    }

    /// Best solution so far.
    pub fn best(&self) -> Option<&Solution> {
        self.best.map(|b| &self.sols[b])
    }

    /// Best objective, +inf when the pool is empty.
    pub fn best_objective(&self) -> f64 {
        self.best().map_or(f64::INFINITY, |s| s.objective)
    }

    /// Number of stored solutions.
    pub fn len(&self) -> usize {
        self.sols.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.sols.is_empty()
    }
}
