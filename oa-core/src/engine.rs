//! Engine abstraction: the NLP and MILP solvers the core drives.
//!
//! Engines are external; the core only sees these traits and interprets the
//! returned status through a single classifier instead of repeated match
//! cascades.

use crate::model::{Problem, Relaxation};

/// Status returned by an engine solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Global optimum found.
    ProvenOptimal,

    /// Local optimum found (nonconvex NLP engines).
    ProvenLocalOptimal,

    /// Proven infeasible.
    ProvenInfeasible,

    /// Proven locally infeasible.
    ProvenLocalInfeasible,

    /// Objective exceeded the installed cutoff.
    ProvenObjectiveCutOff,

    /// Proven unbounded.
    ProvenUnbounded,

    /// Iteration limit reached; a possibly-suboptimal primal is available.
    EngineIterationLimit,

    /// Engine failed to converge, last iterate feasible.
    FailedFeas,

    /// Engine failed to converge, last iterate infeasible.
    FailedInfeas,

    /// Constraint qualification violated at a feasible point.
    ProvenFailedCQFeas,

    /// Constraint qualification violated at an infeasible point.
    ProvenFailedCQInfeas,

    /// Internal engine error.
    EngineError,

    /// Engine returned a status the core does not understand.
    EngineUnknownStatus,
}

/// How a caller should act on an engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// The primal is usable as-is.
    UsePrimal,

    /// The primal is usable but possibly suboptimal; callers adapt their
    /// cut derivation.
    UsePrimalCaveat,

    /// No primal; record infeasibility.
    Infeasible,

    /// Fatal for the current operation.
    Fatal,
}

impl EngineStatus {
    /// Classify the status into one of four action categories.
    pub fn action(&self) -> StatusAction {
        match self {
            EngineStatus::ProvenOptimal | EngineStatus::ProvenLocalOptimal => {
                StatusAction::UsePrimal
            }
            EngineStatus::EngineIterationLimit => StatusAction::UsePrimalCaveat,
            EngineStatus::ProvenInfeasible
            | EngineStatus::ProvenLocalInfeasible
            | EngineStatus::ProvenObjectiveCutOff => StatusAction::Infeasible,
            EngineStatus::ProvenUnbounded
            | EngineStatus::FailedFeas
            | EngineStatus::FailedInfeas
            | EngineStatus::ProvenFailedCQFeas
            | EngineStatus::ProvenFailedCQInfeas
            | EngineStatus::EngineError
            | EngineStatus::EngineUnknownStatus => StatusAction::Fatal,
        }
    }

    /// Short lowercase description for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::ProvenOptimal => "optimal",
            EngineStatus::ProvenLocalOptimal => "local optimal",
            EngineStatus::ProvenInfeasible => "infeasible",
            EngineStatus::ProvenLocalInfeasible => "local infeasible",
            EngineStatus::ProvenObjectiveCutOff => "objective cutoff",
            EngineStatus::ProvenUnbounded => "unbounded",
            EngineStatus::EngineIterationLimit => "iteration limit",
            EngineStatus::FailedFeas => "failed (feasible)",
            EngineStatus::FailedInfeas => "failed (infeasible)",
            EngineStatus::ProvenFailedCQFeas => "CQ failed (feasible)",
            EngineStatus::ProvenFailedCQInfeas => "CQ failed (infeasible)",
            EngineStatus::EngineError => "engine error",
            EngineStatus::EngineUnknownStatus => "unknown",
        }
    }
}

/// A primal solution returned by an engine.
#[derive(Debug, Clone)]
pub struct EngineSolution {
    /// Objective value.
    pub objective: f64,

    /// Primal point, one entry per variable of the loaded problem.
    pub primal: Vec<f64>,
}

/// A continuous NLP engine.
pub trait NlpEngine {
    /// Load a problem, replacing any previous one.
    fn load(&mut self, problem: &Problem);

    /// Solve the loaded problem.
    fn solve(&mut self) -> EngineStatus;

    /// The last solution, if the engine produced one.
    fn solution(&self) -> Option<&EngineSolution>;

    /// Engine-specific status description for logs.
    fn status_string(&self) -> String;

    /// A fresh engine of the same kind with nothing loaded.
    fn empty_copy(&self) -> Box<dyn NlpEngine>;

    /// Drop the loaded problem and any cached state.
    fn clear(&mut self);
}

/// A MILP engine working on the linear relaxation.
pub trait MilpEngine {
    /// Load a relaxation, replacing any previous one.
    fn load(&mut self, rel: &Relaxation);

    /// Solve the loaded relaxation.
    fn solve(&mut self) -> EngineStatus;

    /// The last solution, if the engine produced one.
    fn solution(&self) -> Option<&EngineSolution>;

    /// Engine-specific status description for logs.
    fn status_string(&self) -> String;

    /// Drop the loaded relaxation and any cached state.
    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_covers_all_statuses() {
        use EngineStatus::*;
        assert_eq!(ProvenOptimal.action(), StatusAction::UsePrimal);
        assert_eq!(ProvenLocalOptimal.action(), StatusAction::UsePrimal);
        assert_eq!(EngineIterationLimit.action(), StatusAction::UsePrimalCaveat);
        for s in [ProvenInfeasible, ProvenLocalInfeasible, ProvenObjectiveCutOff] {
            assert_eq!(s.action(), StatusAction::Infeasible);
        }
        for s in [
            ProvenUnbounded,
            FailedFeas,
            FailedInfeas,
            ProvenFailedCQFeas,
            ProvenFailedCQInfeas,
            EngineError,
            EngineUnknownStatus,
        ] {
            assert_eq!(s.action(), StatusAction::Fatal);
        }
    }

    #[test]
    fn test_status_strings_are_distinct() {
        use EngineStatus::*;
        let all = [
            ProvenOptimal,
            ProvenLocalOptimal,
            ProvenInfeasible,
            ProvenLocalInfeasible,
            ProvenObjectiveCutOff,
            ProvenUnbounded,
            EngineIterationLimit,
            FailedFeas,
            FailedInfeas,
            ProvenFailedCQFeas,
            ProvenFailedCQInfeas,
            EngineError,
            EngineUnknownStatus,
        ];
        let mut seen: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), all.len());
    }
}
