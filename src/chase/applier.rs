//! Rule appliers: how a step's triggers are fired.

use indexmap::IndexSet;

use parking_lot::Mutex;

use crate::atom::Atom;
use crate::chase::head_images;
use crate::chase::lineage::LineageTracker;
use crate::chase::renamer::TriggerRenamer;
use crate::chase::trigger::{Trigger, TriggerChecker, TriggerComputer};
use crate::chase::{ChasableData, ChaseError};
use crate::data::{DatalogDelegable, WritableData};
use crate::kb::RuleBase;
use crate::rule::{has_safe_negation, is_plain_conjunctive};
use crate::session::Session;

/// What one step produced.
#[derive(Clone, Debug)]
pub struct StepResult {
    pub applied_rules: IndexSet<usize>,
    pub created: Vec<Atom>,
}

impl StepResult {
    pub fn initial() -> Self {
        StepResult {
            applied_rules: IndexSet::new(),
            created: Vec::new(),
        }
    }
}

/// Applies a step's scheduled rules to the data.
pub trait RuleApplier {
    fn apply(
        &mut self,
        scheduled: &[usize],
        data: &mut ChasableData<'_>,
        rules: &RuleBase,
        lineage: &mut dyn LineageTracker,
        session: &Session,
    ) -> Result<StepResult, ChaseError>;
}

/// Compute all triggers, then fire them in order. The checker observes the
/// fact base as it grows within the step.
pub struct BreadthFirstApplier {
    computer: Box<dyn TriggerComputer>,
    checker: Box<dyn TriggerChecker>,
    renamer: Box<dyn TriggerRenamer>,
    delta: Vec<Atom>,
    trigger_counter: u64,
}

impl BreadthFirstApplier {
    pub fn new(
        computer: Box<dyn TriggerComputer>,
        checker: Box<dyn TriggerChecker>,
        renamer: Box<dyn TriggerRenamer>,
    ) -> Self {
        BreadthFirstApplier {
            computer,
            checker,
            renamer,
            delta: Vec::new(),
            trigger_counter: 0,
        }
    }

    fn compute_triggers(
        &mut self,
        scheduled: &[usize],
        data: &ChasableData<'_>,
        rules: &RuleBase,
        session: &Session,
    ) -> Vec<Trigger> {
        let ctx = data.read_context();
        let mut triggers = Vec::new();
        for &rule_index in scheduled {
            let rule = &rules.rules()[rule_index];
            for substitution in self.computer.compute(rule, &ctx, &self.delta, session) {
                triggers.push(Trigger {
                    rule_index,
                    substitution,
                });
            }
        }
        triggers
    }
}

impl RuleApplier for BreadthFirstApplier {
    fn apply(
        &mut self,
        scheduled: &[usize],
        data: &mut ChasableData<'_>,
        rules: &RuleBase,
        lineage: &mut dyn LineageTracker,
        session: &Session,
    ) -> Result<StepResult, ChaseError> {
        let triggers = self.compute_triggers(scheduled, data, rules, session);

        let mut result = StepResult::initial();
        for trigger in triggers {
            let rule = &rules.rules()[trigger.rule_index];
            if !self.checker.check(&trigger, rule, data.facts, session) {
                continue;
            }
            let renamed = self
                .renamer
                .rename(trigger.rule_index, rule, &trigger.substitution, session);
            self.trigger_counter += 1;
            result.applied_rules.insert(trigger.rule_index);
            for image in head_images(rule, &renamed, session) {
                if data.facts.add(image.clone()) {
                    lineage.record(&image, trigger.rule_index, self.trigger_counter);
                    result.created.push(image);
                }
            }
        }
        self.delta = result.created.clone();
        Ok(result)
    }
}

/// Two-phase application: every trigger is checked and renamed against the
/// step-start snapshot, then all images land at once.
pub struct ParallelApplier {
    computer: Box<dyn TriggerComputer>,
    checker: Box<dyn TriggerChecker>,
    renamer: Box<dyn TriggerRenamer>,
    delta: Vec<Atom>,
    trigger_counter: u64,
}

impl ParallelApplier {
    pub fn new(
        computer: Box<dyn TriggerComputer>,
        checker: Box<dyn TriggerChecker>,
        renamer: Box<dyn TriggerRenamer>,
    ) -> Self {
        ParallelApplier {
            computer,
            checker,
            renamer,
            delta: Vec::new(),
            trigger_counter: 0,
        }
    }
}

impl RuleApplier for ParallelApplier {
    fn apply(
        &mut self,
        scheduled: &[usize],
        data: &mut ChasableData<'_>,
        rules: &RuleBase,
        lineage: &mut dyn LineageTracker,
        session: &Session,
    ) -> Result<StepResult, ChaseError> {
        let mut triggers = Vec::new();
        {
            let ctx = data.read_context();
            for &rule_index in scheduled {
                let rule = &rules.rules()[rule_index];
                for substitution in self.computer.compute(rule, &ctx, &self.delta, session) {
                    triggers.push(Trigger {
                        rule_index,
                        substitution,
                    });
                }
            }
        }

        // Phase one: decide and rename against the snapshot.
        let mut batch: Vec<(usize, u64, Vec<Atom>)> = Vec::new();
        let mut applied: IndexSet<usize> = IndexSet::new();
        for trigger in triggers {
            let rule = &rules.rules()[trigger.rule_index];
            if !self.checker.check(&trigger, rule, data.facts, session) {
                continue;
            }
            let renamed = self
                .renamer
                .rename(trigger.rule_index, rule, &trigger.substitution, session);
            self.trigger_counter += 1;
            applied.insert(trigger.rule_index);
            batch.push((
                trigger.rule_index,
                self.trigger_counter,
                head_images(rule, &renamed, session),
            ));
        }

        // Phase two: commit.
        let mut result = StepResult {
            applied_rules: applied,
            created: Vec::new(),
        };
        for (rule_index, trigger_id, images) in batch {
            for image in images {
                if data.facts.add(image.clone()) {
                    lineage.record(&image, rule_index, trigger_id);
                    result.created.push(image);
                }
            }
        }
        self.delta = result.created.clone();
        Ok(result)
    }
}

/// Scoped threads fire the checked triggers; a mutex serializes renaming
/// and fact-base mutation. The resulting *set* of facts matches the
/// sequential appliers whenever the renamer is deterministic; the order
/// does not.
pub struct MultiThreadApplier {
    computer: Box<dyn TriggerComputer>,
    checker: Box<dyn TriggerChecker>,
    renamer: Box<dyn TriggerRenamer>,
    threads: usize,
    delta: Vec<Atom>,
    trigger_counter: u64,
}

impl MultiThreadApplier {
    pub fn new(
        computer: Box<dyn TriggerComputer>,
        checker: Box<dyn TriggerChecker>,
        renamer: Box<dyn TriggerRenamer>,
        threads: usize,
    ) -> Self {
        MultiThreadApplier {
            computer,
            checker,
            renamer,
            threads: threads.max(1),
            delta: Vec::new(),
            trigger_counter: 0,
        }
    }
}

impl RuleApplier for MultiThreadApplier {
    fn apply(
        &mut self,
        scheduled: &[usize],
        data: &mut ChasableData<'_>,
        rules: &RuleBase,
        lineage: &mut dyn LineageTracker,
        session: &Session,
    ) -> Result<StepResult, ChaseError> {
        let mut triggers = Vec::new();
        {
            let ctx = data.read_context();
            for &rule_index in scheduled {
                let rule = &rules.rules()[rule_index];
                for substitution in self.computer.compute(rule, &ctx, &self.delta, session) {
                    triggers.push(Trigger {
                        rule_index,
                        substitution,
                    });
                }
            }
        }

        // Checking stays sequential (checkers are stateful); firing is
        // fanned out.
        let mut checked: Vec<(Trigger, u64)> = Vec::new();
        let mut applied: IndexSet<usize> = IndexSet::new();
        for trigger in triggers {
            let rule = &rules.rules()[trigger.rule_index];
            if self.checker.check(&trigger, rule, data.facts, session) {
                self.trigger_counter += 1;
                applied.insert(trigger.rule_index);
                checked.push((trigger, self.trigger_counter));
            }
        }

        let renamer = Mutex::new(self.renamer.as_mut());
        let shared_facts = Mutex::new(&mut *data.facts);
        let created = Mutex::new(Vec::<(Atom, usize, u64)>::new());

        std::thread::scope(|scope| {
            let chunk = checked.len().div_ceil(self.threads).max(1);
            for work in checked.chunks(chunk) {
                let renamer = &renamer;
                let shared_facts = &shared_facts;
                let created = &created;
                scope.spawn(move || {
                    for (trigger, trigger_id) in work {
                        let rule = &rules.rules()[trigger.rule_index];
                        let renamed = renamer.lock().rename(
                            trigger.rule_index,
                            rule,
                            &trigger.substitution,
                            session,
                        );
                        let images = head_images(rule, &renamed, session);
                        let mut facts = shared_facts.lock();
                        for image in images {
                            if facts.add(image.clone()) {
                                created.lock().push((
                                    image,
                                    trigger.rule_index,
                                    *trigger_id,
                                ));
                            }
                        }
                    }
                });
            }
        });

        let mut result = StepResult {
            applied_rules: applied,
            created: Vec::new(),
        };
        for (image, rule_index, trigger_id) in created.into_inner() {
            lineage.record(&image, rule_index, trigger_id);
            result.created.push(image);
        }
        self.delta = result.created.clone();
        Ok(result)
    }
}

/// Hands the plain-datalog subset of the scheduled rules to the store
/// itself; everything else goes through a breadth-first fallback.
pub struct SourceDelegatedApplier {
    fallback: BreadthFirstApplier,
}

impl SourceDelegatedApplier {
    pub fn new(fallback: BreadthFirstApplier) -> Self {
        SourceDelegatedApplier { fallback }
    }
}

impl RuleApplier for SourceDelegatedApplier {
    fn apply(
        &mut self,
        scheduled: &[usize],
        data: &mut ChasableData<'_>,
        rules: &RuleBase,
        lineage: &mut dyn LineageTracker,
        session: &Session,
    ) -> Result<StepResult, ChaseError> {
        let mut delegable: Vec<usize> = Vec::new();
        let mut rest: Vec<usize> = Vec::new();
        for &rule_index in scheduled {
            let rule = &rules.rules()[rule_index];
            if is_plain_conjunctive(rule, session) && rule.negative_body().is_empty() {
                delegable.push(rule_index);
            } else if has_safe_negation(rule, session) {
                rest.push(rule_index);
            } else {
                return Err(ChaseError::UnsupportedRule(rule.display(session)));
            }
        }

        let delegated_rules: Vec<_> = delegable
            .iter()
            .map(|&i| rules.rules()[i].clone())
            .collect();
        let created = data.facts.delegate_rules(&delegated_rules, session);
        let mut result = self.fallback.apply(&rest, data, rules, lineage, session)?;
        if !created.is_empty() {
            result.applied_rules.extend(delegable);
            result.created.extend(created);
        }
        // Keep the fallback's delta aware of delegated creations.
        self.fallback.delta = result.created.clone();
        Ok(result)
    }
}
