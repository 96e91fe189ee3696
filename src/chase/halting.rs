//! Chase halting conditions.
//!
//! A halting condition votes at the start of each step; the first
//! condition that votes to stop names the [`HaltReason`]. Halting is not a
//! failure: the reason is returned alongside the saturated fact base.

use std::time::{Duration, Instant};

use crate::session::CancelFlag;

/// Why a chase stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HaltReason {
    StepLimit(usize),
    AtomLimit(usize),
    Timeout(Duration),
    Interrupted,
    NoNewFacts,
    NoRulesToApply,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::StepLimit(n) => write!(f, "step limit {n} reached"),
            HaltReason::AtomLimit(n) => write!(f, "atom limit {n} reached"),
            HaltReason::Timeout(d) => write!(f, "timed out after {d:?}"),
            HaltReason::Interrupted => write!(f, "interrupted"),
            HaltReason::NoNewFacts => write!(f, "no facts created in the previous step"),
            HaltReason::NoRulesToApply => write!(f, "no rules left to apply"),
        }
    }
}

/// Snapshot of the chase loop handed to conditions and treatments.
#[derive(Clone, Debug)]
pub struct ChaseObservation {
    /// Steps completed so far.
    pub step_number: usize,
    /// Current fact-base size.
    pub fact_count: usize,
    /// Facts created by the previous step.
    pub created_last_step: usize,
    /// Rules scheduled by the previous step, when one ran.
    pub scheduled_last_step: Option<usize>,
    /// When the chase started.
    pub started: Instant,
}

/// A halting condition, polled at step boundaries.
pub trait HaltingCondition {
    /// Vote: `true` keeps the chase running.
    fn should_continue(&mut self, observation: &ChaseObservation) -> bool;

    /// The reason reported when this condition stops the chase.
    fn reason(&self) -> HaltReason;
}

/// Stop after a fixed number of steps.
pub struct StepLimit(pub usize);

impl HaltingCondition for StepLimit {
    fn should_continue(&mut self, observation: &ChaseObservation) -> bool {
        observation.step_number < self.0
    }

    fn reason(&self) -> HaltReason {
        HaltReason::StepLimit(self.0)
    }
}

/// Stop when the fact base grows past a total size.
pub struct AtomLimit(pub usize);

impl HaltingCondition for AtomLimit {
    fn should_continue(&mut self, observation: &ChaseObservation) -> bool {
        observation.fact_count < self.0
    }

    fn reason(&self) -> HaltReason {
        HaltReason::AtomLimit(self.0)
    }
}

/// Stop once wall-clock time runs out; polled at step starts.
pub struct Timeout(pub Duration);

impl HaltingCondition for Timeout {
    fn should_continue(&mut self, observation: &ChaseObservation) -> bool {
        observation.started.elapsed() < self.0
    }

    fn reason(&self) -> HaltReason {
        HaltReason::Timeout(self.0)
    }
}

/// Stop when the external cancellation flag is raised.
pub struct ExternalInterruption(pub CancelFlag);

impl HaltingCondition for ExternalInterruption {
    fn should_continue(&mut self, _observation: &ChaseObservation) -> bool {
        !self.0.is_cancelled()
    }

    fn reason(&self) -> HaltReason {
        HaltReason::Interrupted
    }
}

/// Stop when the previous step created nothing (the fixpoint condition).
pub struct CreatedFactsAtPreviousStep;

impl HaltingCondition for CreatedFactsAtPreviousStep {
    fn should_continue(&mut self, observation: &ChaseObservation) -> bool {
        observation.step_number == 0 || observation.created_last_step > 0
    }

    fn reason(&self) -> HaltReason {
        HaltReason::NoNewFacts
    }
}

/// Stop when the scheduler returned nothing to apply.
pub struct HasRulesToApply;

impl HaltingCondition for HasRulesToApply {
    fn should_continue(&mut self, observation: &ChaseObservation) -> bool {
        observation.scheduled_last_step != Some(0)
    }

    fn reason(&self) -> HaltReason {
        HaltReason::NoRulesToApply
    }
}
