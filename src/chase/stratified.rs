//! Stratified chase: one sub-chase per stratum.
//!
//! The rule set is stratified on the dependency graph; each stratum runs
//! to a fixpoint (or to one of the shared halting conditions) and the next
//! stratum starts from the saturated fact base. Negation is well-founded
//! because every negative edge points into an earlier stratum.

use crate::chase::halting::HaltReason;
use crate::chase::{ChasableData, Chase, ChaseBuilder, ChaseError, ChaseResult};
use crate::grd::stratification::{stratify, StratificationError, StratificationStrategy};
use crate::grd::{DependencyMode, Grd};
use crate::kb::RuleBase;
use crate::session::Session;

/// A stratified chase failure.
#[derive(Debug)]
pub enum StratifiedChaseError {
    Stratification(StratificationError),
    Chase(ChaseError),
}

impl std::fmt::Display for StratifiedChaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StratifiedChaseError::Stratification(e) => write!(f, "{e}"),
            StratifiedChaseError::Chase(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StratifiedChaseError {}

impl From<StratificationError> for StratifiedChaseError {
    fn from(e: StratificationError) -> Self {
        StratifiedChaseError::Stratification(e)
    }
}

impl From<ChaseError> for StratifiedChaseError {
    fn from(e: ChaseError) -> Self {
        StratifiedChaseError::Chase(e)
    }
}

/// Outcome of a stratified run: one result per stratum, plus the overall
/// halt reason (the last stratum's, or the first non-fixpoint halt).
#[derive(Debug)]
pub struct StratifiedChaseResult {
    pub strata: Vec<ChaseResult>,
    pub halt_reason: HaltReason,
}

/// Runs a chase per stratum, in stratum order.
pub struct StratifiedChase {
    mode: DependencyMode,
    strategy: StratificationStrategy,
    configure: Box<dyn Fn(ChaseBuilder) -> ChaseBuilder>,
}

impl Default for StratifiedChase {
    fn default() -> Self {
        StratifiedChase {
            mode: DependencyMode::Predicate,
            strategy: StratificationStrategy::ByScc,
            configure: Box::new(|builder| builder),
        }
    }
}

impl StratifiedChase {
    pub fn new(mode: DependencyMode, strategy: StratificationStrategy) -> Self {
        StratifiedChase {
            mode,
            strategy,
            ..Default::default()
        }
    }

    /// Configure every per-stratum chase (checker, renamer, halting...).
    pub fn configure(
        mut self,
        configure: impl Fn(ChaseBuilder) -> ChaseBuilder + 'static,
    ) -> Self {
        self.configure = Box::new(configure);
        self
    }

    /// Stratify and run. Each stratum reaches its fixpoint before the next
    /// one starts.
    pub fn execute(
        &self,
        rules: &RuleBase,
        data: &mut ChasableData<'_>,
        session: &Session,
    ) -> Result<StratifiedChaseResult, StratifiedChaseError> {
        let grd = Grd::new(rules.rules().to_vec(), self.mode, session);
        let strata = stratify(&grd, self.strategy, session)?;

        let mut results = Vec::new();
        let mut halt_reason = HaltReason::NoNewFacts;
        for (index, stratum) in strata.into_iter().enumerate() {
            let builder = Chase::builder().rules(stratum, session);
            let mut chase = (self.configure)(builder).build();
            let result = chase.execute(data, session)?;
            log::debug!(
                "stratum {index}: halted after {} steps ({})",
                result.steps,
                result.halt_reason
            );
            halt_reason = result.halt_reason.clone();
            results.push(result);
            if halt_reason != HaltReason::NoNewFacts {
                // A hard halt (limit, timeout, interruption) stops the
                // whole pipeline.
                break;
            }
        }
        Ok(StratifiedChaseResult {
            strata: results,
            halt_reason,
        })
    }
}
