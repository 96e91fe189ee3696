//! Rule schedulers: which rules are candidates at each step.

use indexmap::IndexSet;

use crate::atom::Atom;
use crate::grd::{DependencyMode, Grd};
use crate::id::PredId;
use crate::kb::RuleBase;
use crate::session::Session;

/// Chooses the candidate rules for the next step, given what the previous
/// step applied and created.
pub trait RuleScheduler {
    fn init(&mut self, _rules: &RuleBase, _session: &Session) {}

    /// The indices of the rules to try this step.
    fn rules_to_apply(
        &mut self,
        applied_last_step: &IndexSet<usize>,
        created_last_step: &[Atom],
        rules: &RuleBase,
        session: &Session,
    ) -> Vec<usize>;
}

/// Every rule, every step.
#[derive(Default)]
pub struct NaiveScheduler;

impl RuleScheduler for NaiveScheduler {
    fn rules_to_apply(
        &mut self,
        _applied: &IndexSet<usize>,
        _created: &[Atom],
        rules: &RuleBase,
        _session: &Session,
    ) -> Vec<usize> {
        (0..rules.len()).collect()
    }
}

/// Rules whose positive body mentions a predicate touched last step.
#[derive(Default)]
pub struct ByPredicateScheduler {
    first_step_done: bool,
}

impl RuleScheduler for ByPredicateScheduler {
    fn rules_to_apply(
        &mut self,
        _applied: &IndexSet<usize>,
        created: &[Atom],
        rules: &RuleBase,
        _session: &Session,
    ) -> Vec<usize> {
        if !self.first_step_done {
            self.first_step_done = true;
            return (0..rules.len()).collect();
        }
        let touched: IndexSet<PredId> = created.iter().map(|a| a.predicate).collect();
        rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| {
                rule.positive_body()
                    .iter()
                    .any(|a| touched.contains(&a.predicate))
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Rules reachable in the dependency graph from the rules applied last
/// step.
pub struct GrdScheduler {
    mode: DependencyMode,
    grd: Option<Grd>,
    first_step_done: bool,
}

impl GrdScheduler {
    pub fn new(mode: DependencyMode) -> Self {
        GrdScheduler {
            mode,
            grd: None,
            first_step_done: false,
        }
    }
}

impl RuleScheduler for GrdScheduler {
    fn init(&mut self, rules: &RuleBase, session: &Session) {
        self.grd = Some(Grd::new(rules.rules().to_vec(), self.mode, session));
        self.first_step_done = false;
    }

    fn rules_to_apply(
        &mut self,
        applied: &IndexSet<usize>,
        _created: &[Atom],
        rules: &RuleBase,
        _session: &Session,
    ) -> Vec<usize> {
        if !self.first_step_done {
            self.first_step_done = true;
            return (0..rules.len()).collect();
        }
        let grd = match &self.grd {
            Some(grd) => grd,
            None => return (0..rules.len()).collect(),
        };
        let mut candidates: IndexSet<usize> = IndexSet::new();
        for &source in applied {
            candidates.extend(grd.triggered_rules(source));
        }
        candidates.into_iter().collect()
    }
}
