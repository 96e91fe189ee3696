//! Forward chaining: the chase.
//!
//! The chase saturates a fact base under a rule set. Each step schedules
//! candidate rules, computes their triggers, checks which triggers still
//! need to fire, renames existential witnesses, and applies the head
//! images. Pluggable strategies cover every stage; halting conditions are
//! polled at step boundaries and the reason is returned with the result
//! (halting is not a failure).
//!
//! Strategy objects are dispatched dynamically at step boundaries only;
//! inner loops run on concrete types.

pub mod applier;
pub mod halting;
pub mod lineage;
pub mod renamer;
pub mod scheduler;
pub mod stratified;
pub mod treatment;
pub mod trigger;

use std::time::Instant;

use crate::atom::Atom;
use crate::data::fact_base::InMemoryFactBase;
use crate::data::{DataContext, EvaluationError, ReadableData};
use crate::kb::RuleBase;
use crate::query::function_rewrite::expand_formula;
use crate::rule::Rule;
use crate::session::Session;

pub use applier::{
    BreadthFirstApplier, MultiThreadApplier, ParallelApplier, RuleApplier,
    SourceDelegatedApplier, StepResult,
};
pub use halting::{
    AtomLimit, ChaseObservation, CreatedFactsAtPreviousStep, ExternalInterruption, HaltReason,
    HaltingCondition, HasRulesToApply, StepLimit, Timeout,
};
pub use lineage::{
    FederatedLineageTracker, LineageTracker, NoLineageTracker, SimpleLineageTracker,
};
pub use renamer::{
    BodySkolemRenamer, FreshRenamer, FrontierByPieceSkolemRenamer, FrontierSkolemRenamer,
    TriggerRenamer, WitnessKind,
};
pub use scheduler::{ByPredicateScheduler, GrdScheduler, NaiveScheduler, RuleScheduler};
pub use treatment::{
    AddCreatedFactsTreatment, ComputeCoreTreatment, DebugTreatment, LocalCoreTreatment,
    PredicateFilterTreatment, RuleSplitTreatment, Treatment,
};
pub use trigger::{
    AlwaysTrueChecker, EquivalentChecker, MultiTriggerChecker, NaiveTriggerComputer,
    ObliviousChecker, RestrictedChecker, RestrictedTriggerComputer, SemiNaiveTriggerComputer,
    SemiObliviousChecker, Trigger, TriggerChecker, TriggerComputer, TwoStepsTriggerComputer,
};

/// A chase failure (distinct from a halt).
#[derive(Debug)]
pub enum ChaseError {
    Evaluation(EvaluationError),
    UnsupportedRule(String),
}

impl std::fmt::Display for ChaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChaseError::Evaluation(e) => write!(f, "{e}"),
            ChaseError::UnsupportedRule(s) => write!(f, "unsupported rule: {s}"),
        }
    }
}

impl std::error::Error for ChaseError {}

impl From<EvaluationError> for ChaseError {
    fn from(e: EvaluationError) -> Self {
        ChaseError::Evaluation(e)
    }
}

/// The data a chase runs against: the mutable fact base plus read-only
/// side sources (computed functions, comparisons, external stores).
pub struct ChasableData<'a> {
    pub facts: &'a mut InMemoryFactBase,
    pub extra_sources: Vec<&'a dyn ReadableData>,
}

impl<'a> ChasableData<'a> {
    pub fn new(facts: &'a mut InMemoryFactBase) -> Self {
        ChasableData {
            facts,
            extra_sources: Vec::new(),
        }
    }

    pub fn with_sources(
        facts: &'a mut InMemoryFactBase,
        extra_sources: Vec<&'a dyn ReadableData>,
    ) -> Self {
        ChasableData {
            facts,
            extra_sources,
        }
    }

    /// A read view federating the fact base with the side sources.
    pub fn read_context(&self) -> DataContext<'_> {
        let mut sources: Vec<&dyn ReadableData> = vec![&*self.facts];
        sources.extend(self.extra_sources.iter().copied());
        DataContext::new(sources)
    }
}

/// Outcome of a chase run.
#[derive(Debug)]
pub struct ChaseResult {
    pub halt_reason: HaltReason,
    pub steps: usize,
    pub created: usize,
}

/// The chase driver.
pub struct Chase {
    rules: RuleBase,
    scheduler: Box<dyn RuleScheduler>,
    applier: Box<dyn RuleApplier>,
    halting: Vec<Box<dyn HaltingCondition>>,
    lineage: Box<dyn LineageTracker>,
    global_pretreatments: Vec<Box<dyn Treatment>>,
    step_pretreatments: Vec<Box<dyn Treatment>>,
    end_of_step_treatments: Vec<Box<dyn Treatment>>,
    global_end_treatments: Vec<Box<dyn Treatment>>,
}

impl Chase {
    pub fn builder() -> ChaseBuilder {
        ChaseBuilder::default()
    }

    /// Run to a halt. The fact base in `data` ends up saturated; the halt
    /// reason says why the loop stopped.
    pub fn execute(
        &mut self,
        data: &mut ChasableData<'_>,
        session: &Session,
    ) -> Result<ChaseResult, ChaseError> {
        self.scheduler.init(&self.rules, session);
        for treatment in &mut self.global_pretreatments {
            treatment.apply(data, &mut self.rules, &StepResult::initial(), session);
        }

        let started = Instant::now();
        let mut step_number = 0usize;
        let mut last_step = StepResult::initial();
        let mut scheduled_last: Option<usize> = None;
        let mut created_total = 0usize;

        let halt_reason = loop {
            let observation = ChaseObservation {
                step_number,
                fact_count: data.facts.len(),
                created_last_step: last_step.created.len(),
                scheduled_last_step: scheduled_last,
                started,
            };
            let mut halted = None;
            for condition in &mut self.halting {
                if !condition.should_continue(&observation) {
                    halted = Some(condition.reason());
                    break;
                }
            }
            if let Some(reason) = halted {
                break reason;
            }

            for treatment in &mut self.step_pretreatments {
                treatment.apply(data, &mut self.rules, &last_step, session);
            }

            let scheduled = self.scheduler.rules_to_apply(
                &last_step.applied_rules,
                &last_step.created,
                &self.rules,
                session,
            );
            scheduled_last = Some(scheduled.len());

            last_step = self.applier.apply(
                &scheduled,
                data,
                &self.rules,
                self.lineage.as_mut(),
                session,
            )?;
            created_total += last_step.created.len();
            step_number += 1;

            for treatment in &mut self.end_of_step_treatments {
                treatment.apply(data, &mut self.rules, &last_step, session);
            }
            log::debug!(
                "chase step {step_number}: {} new facts ({} total)",
                last_step.created.len(),
                data.facts.len()
            );
        };

        for treatment in &mut self.global_end_treatments {
            treatment.apply(data, &mut self.rules, &last_step, session);
        }

        Ok(ChaseResult {
            halt_reason,
            steps: step_number,
            created: created_total,
        })
    }

    /// The lineage recorded so far.
    pub fn lineage(&self) -> &dyn LineageTracker {
        self.lineage.as_ref()
    }
}

/// Assembles a chase from strategy parts. Defaults: naive scheduler,
/// breadth-first applier over a naive computer with the semi-oblivious
/// checker and the frontier pseudo-skolem renamer, halting on fixpoint.
pub struct ChaseBuilder {
    rules: RuleBase,
    scheduler: Option<Box<dyn RuleScheduler>>,
    computer: Option<Box<dyn TriggerComputer>>,
    checker: Option<Box<dyn TriggerChecker>>,
    renamer: Option<Box<dyn TriggerRenamer>>,
    applier: Option<Box<dyn RuleApplier>>,
    halting: Vec<Box<dyn HaltingCondition>>,
    lineage: Option<Box<dyn LineageTracker>>,
    global_pretreatments: Vec<Box<dyn Treatment>>,
    step_pretreatments: Vec<Box<dyn Treatment>>,
    end_of_step_treatments: Vec<Box<dyn Treatment>>,
    global_end_treatments: Vec<Box<dyn Treatment>>,
}

impl Default for ChaseBuilder {
    fn default() -> Self {
        ChaseBuilder {
            rules: RuleBase::default(),
            scheduler: None,
            computer: None,
            checker: None,
            renamer: None,
            applier: None,
            halting: Vec::new(),
            lineage: None,
            global_pretreatments: Vec::new(),
            step_pretreatments: Vec::new(),
            end_of_step_treatments: Vec::new(),
            global_end_treatments: Vec::new(),
        }
    }
}

impl ChaseBuilder {
    /// The rule base to saturate with. Evaluable function terms in rule
    /// bodies are rewritten into computed atoms here.
    pub fn rules(mut self, rules: RuleBase, session: &Session) -> Self {
        let rewritten = rules
            .iter()
            .map(|r| Rule {
                body: expand_formula(&r.body, session),
                head: r.head.clone(),
                label: r.label.clone(),
            })
            .collect::<Vec<_>>();
        let mut base = RuleBase::new(rewritten);
        base.label = rules.label.clone();
        self.rules = base;
        self
    }

    pub fn scheduler(mut self, scheduler: Box<dyn RuleScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn trigger_computer(mut self, computer: Box<dyn TriggerComputer>) -> Self {
        self.computer = Some(computer);
        self
    }

    pub fn trigger_checker(mut self, checker: Box<dyn TriggerChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn renamer(mut self, renamer: Box<dyn TriggerRenamer>) -> Self {
        self.renamer = Some(renamer);
        self
    }

    /// Use a custom applier. The applier owns computer/checker/renamer;
    /// setting it overrides those three.
    pub fn applier(mut self, applier: Box<dyn RuleApplier>) -> Self {
        self.applier = Some(applier);
        self
    }

    pub fn halting_condition(mut self, condition: Box<dyn HaltingCondition>) -> Self {
        self.halting.push(condition);
        self
    }

    pub fn lineage(mut self, lineage: Box<dyn LineageTracker>) -> Self {
        self.lineage = Some(lineage);
        self
    }

    pub fn global_pretreatment(mut self, treatment: Box<dyn Treatment>) -> Self {
        self.global_pretreatments.push(treatment);
        self
    }

    pub fn step_pretreatment(mut self, treatment: Box<dyn Treatment>) -> Self {
        self.step_pretreatments.push(treatment);
        self
    }

    pub fn end_of_step_treatment(mut self, treatment: Box<dyn Treatment>) -> Self {
        self.end_of_step_treatments.push(treatment);
        self
    }

    pub fn global_end_treatment(mut self, treatment: Box<dyn Treatment>) -> Self {
        self.global_end_treatments.push(treatment);
        self
    }

    pub fn build(self) -> Chase {
        let computer = self
            .computer
            .unwrap_or_else(|| Box::new(NaiveTriggerComputer));
        let checker = self
            .checker
            .unwrap_or_else(|| Box::<SemiObliviousChecker>::default());
        let renamer = self
            .renamer
            .unwrap_or_else(|| Box::new(FrontierSkolemRenamer::new(WitnessKind::Pseudo)));
        let applier = self
            .applier
            .unwrap_or_else(|| Box::new(BreadthFirstApplier::new(computer, checker, renamer)));
        let mut halting = self.halting;
        if halting.is_empty() {
            halting.push(Box::new(CreatedFactsAtPreviousStep));
        }
        Chase {
            rules: self.rules,
            scheduler: self.scheduler.unwrap_or_else(|| Box::new(NaiveScheduler)),
            applier,
            halting,
            lineage: self.lineage.unwrap_or_else(|| Box::new(NoLineageTracker)),
            global_pretreatments: self.global_pretreatments,
            step_pretreatments: self.step_pretreatments,
            end_of_step_treatments: self.end_of_step_treatments,
            global_end_treatments: self.global_end_treatments,
        }
    }
}

/// Helper for appliers: the ground images of every head disjunct.
pub(crate) fn head_images(
    rule: &Rule,
    renamed: &crate::substitution::Substitution,
    session: &Session,
) -> Vec<Atom> {
    let mut out = Vec::new();
    for disjunct in 0..rule.head_disjuncts().len() {
        if let Some(atoms) = rule.head_disjunct_atoms(disjunct) {
            for atom in atoms {
                out.push(atom.apply(renamed, session));
            }
        }
    }
    out
}
