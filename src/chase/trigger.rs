//! Trigger computation and trigger checking.
//!
//! A trigger is a (rule, body substitution) pair. Computers enumerate
//! candidate triggers over the current data; checkers decide whether a
//! candidate still needs to fire.

use indexmap::IndexSet;

use crate::atom::Atom;
use crate::data::fact_base::InMemoryFactBase;
use crate::data::{BasicQuery, DataContext, ReadableData, WritableData};
use crate::homomorphism::{exist_homomorphism, homomorphisms, match_atom_against_fact};
use crate::id::VarId;
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// A candidate rule application.
#[derive(Clone, Debug)]
pub struct Trigger {
    pub rule_index: usize,
    pub substitution: Substitution,
}

/// Does the substitution satisfy the negated body atoms? A negated atom
/// blocks the trigger as soon as one instance of it holds.
pub fn passes_negative_body(
    rule: &Rule,
    sub: &Substitution,
    ctx: &DataContext<'_>,
    session: &Session,
) -> bool {
    for atom in rule.negative_body() {
        let image = atom.apply(sub, session);
        let source = match ctx.route(session, image.predicate) {
            Some(source) => source,
            None => continue,
        };
        let mut query = BasicQuery::new(image.predicate);
        for (pos, &term) in image.args.iter().enumerate() {
            if session.is_ground(term) {
                query = query.bind(pos, term);
            } else if let Term::Variable(v) = term {
                query = query.answer(pos, v);
            }
        }
        match source.evaluate(session, &query) {
            Ok(mut tuples) => {
                if tuples.next().is_some() {
                    return false;
                }
            }
            Err(err) => {
                log::warn!("{err}");
                return false;
            }
        }
    }
    true
}

/// Enumerates the body substitutions of a scheduled rule.
pub trait TriggerComputer {
    /// `delta` holds the facts created by the previous step.
    fn compute(
        &mut self,
        rule: &Rule,
        ctx: &DataContext<'_>,
        delta: &[Atom],
        session: &Session,
    ) -> Vec<Substitution>;
}

/// All body homomorphisms, every step.
#[derive(Default)]
pub struct NaiveTriggerComputer;

impl TriggerComputer for NaiveTriggerComputer {
    fn compute(
        &mut self,
        rule: &Rule,
        ctx: &DataContext<'_>,
        _delta: &[Atom],
        session: &Session,
    ) -> Vec<Substitution> {
        let body = rule.positive_body();
        let mut out = Vec::new();
        let federated = Federation { ctx: ctx.clone() };
        for sub in homomorphisms(&body, &federated, Substitution::new(), session) {
            if passes_negative_body(rule, &sub, ctx, session) {
                out.push(sub);
            }
        }
        out
    }
}

/// Homomorphisms whose body image uses at least one fact of the delta.
#[derive(Default)]
pub struct RestrictedTriggerComputer {
    naive: NaiveTriggerComputer,
    first_step_done: bool,
}

impl TriggerComputer for RestrictedTriggerComputer {
    fn compute(
        &mut self,
        rule: &Rule,
        ctx: &DataContext<'_>,
        delta: &[Atom],
        session: &Session,
    ) -> Vec<Substitution> {
        let all = self.naive.compute(rule, ctx, delta, session);
        if !self.first_step_done {
            self.first_step_done = true;
            return all;
        }
        let delta_set: IndexSet<&Atom> = delta.iter().collect();
        all.into_iter()
            .filter(|sub| {
                rule.positive_body()
                    .iter()
                    .any(|atom| delta_set.contains(&atom.apply(sub, session)))
            })
            .collect()
    }
}

/// Classical semi-naive enumeration: one body atom is seeded from the
/// delta, the rest match against the whole data.
#[derive(Default)]
pub struct SemiNaiveTriggerComputer {
    first_step_done: bool,
}

impl TriggerComputer for SemiNaiveTriggerComputer {
    fn compute(
        &mut self,
        rule: &Rule,
        ctx: &DataContext<'_>,
        delta: &[Atom],
        session: &Session,
    ) -> Vec<Substitution> {
        if !self.first_step_done {
            self.first_step_done = true;
            return NaiveTriggerComputer.compute(rule, ctx, delta, session);
        }
        delta_seeded(rule, ctx, delta, session)
    }
}

/// Like semi-naive, but the delta is materialized into an indexed store
/// before enumeration.
#[derive(Default)]
pub struct TwoStepsTriggerComputer {
    first_step_done: bool,
}

impl TriggerComputer for TwoStepsTriggerComputer {
    fn compute(
        &mut self,
        rule: &Rule,
        ctx: &DataContext<'_>,
        delta: &[Atom],
        session: &Session,
    ) -> Vec<Substitution> {
        if !self.first_step_done {
            self.first_step_done = true;
            return NaiveTriggerComputer.compute(rule, ctx, delta, session);
        }
        let mut materialized = InMemoryFactBase::new();
        for atom in delta {
            materialized.add(atom.clone());
        }
        let seeds: Vec<Atom> = materialized.iter().cloned().collect();
        delta_seeded(rule, ctx, &seeds, session)
    }
}

fn delta_seeded(
    rule: &Rule,
    ctx: &DataContext<'_>,
    delta: &[Atom],
    session: &Session,
) -> Vec<Substitution> {
    let body = rule.positive_body();
    let federated = Federation { ctx: ctx.clone() };
    let mut seen: IndexSet<Vec<(VarId, Term)>> = IndexSet::new();
    let mut out = Vec::new();
    for (seed_position, seed_atom) in body.iter().enumerate() {
        for fact in delta {
            let seeded =
                match match_atom_against_fact(seed_atom, fact, &Substitution::new(), session) {
                    Some(sub) => sub,
                    None => continue,
                };
            let rest: Vec<Atom> = body
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != seed_position)
                .map(|(_, a)| a.clone())
                .collect();
            for sub in homomorphisms(&rest, &federated, seeded, session) {
                if !passes_negative_body(rule, &sub, ctx, session) {
                    continue;
                }
                let key = sub.canonical_key();
                if seen.insert(key) {
                    out.push(sub);
                }
            }
        }
    }
    out
}

/// A federated view over the data context, so homomorphism search probes
/// whichever source owns each predicate.
struct Federation<'a> {
    ctx: DataContext<'a>,
}

impl<'a> ReadableData for Federation<'a> {
    fn name(&self) -> &str {
        "chase-federation"
    }

    fn predicates(&self) -> Vec<crate::id::PredId> {
        self.ctx
            .sources()
            .iter()
            .flat_map(|s| s.predicates())
            .collect()
    }

    fn has_predicate(&self, session: &Session, predicate: crate::id::PredId) -> bool {
        self.ctx.route(session, predicate).is_some()
    }

    fn pattern(
        &self,
        session: &Session,
        predicate: crate::id::PredId,
    ) -> Option<crate::data::AtomicPattern> {
        self.ctx
            .route(session, predicate)
            .and_then(|s| s.pattern(session, predicate))
    }

    fn can_evaluate(&self, session: &Session, query: &BasicQuery) -> bool {
        self.ctx
            .route(session, query.predicate)
            .is_some_and(|s| s.can_evaluate(session, query))
    }

    fn evaluate<'b>(
        &'b self,
        session: &'b Session,
        query: &BasicQuery,
    ) -> Result<crate::data::TupleIter<'b>, crate::data::EvaluationError> {
        match self.ctx.route(session, query.predicate) {
            Some(source) => source.evaluate(session, query),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn estimate_bound(&self, session: &Session, query: &BasicQuery) -> Option<usize> {
        self.ctx
            .route(session, query.predicate)
            .and_then(|s| s.estimate_bound(session, query))
    }

    fn terms(&self) -> Option<Vec<Term>> {
        self.ctx.terms()
    }
}

// ----------------------------------------------------------------------
// Trigger checkers
// ----------------------------------------------------------------------

/// Decides whether a computed trigger still needs to fire.
pub trait TriggerChecker {
    fn check(
        &mut self,
        trigger: &Trigger,
        rule: &Rule,
        facts: &InMemoryFactBase,
        session: &Session,
    ) -> bool;
}

/// Fire everything.
#[derive(Default)]
pub struct AlwaysTrueChecker;

impl TriggerChecker for AlwaysTrueChecker {
    fn check(
        &mut self,
        _trigger: &Trigger,
        _rule: &Rule,
        _facts: &InMemoryFactBase,
        _session: &Session,
    ) -> bool {
        true
    }
}

/// Fire each (rule, body substitution) pair once.
#[derive(Default)]
pub struct ObliviousChecker {
    treated: IndexSet<(usize, Vec<(VarId, Term)>)>,
}

impl TriggerChecker for ObliviousChecker {
    fn check(
        &mut self,
        trigger: &Trigger,
        _rule: &Rule,
        _facts: &InMemoryFactBase,
        _session: &Session,
    ) -> bool {
        self.treated
            .insert((trigger.rule_index, trigger.substitution.canonical_key()))
    }
}

/// Fire once per (rule, frontier restriction).
#[derive(Default)]
pub struct SemiObliviousChecker {
    treated: IndexSet<(usize, Vec<(VarId, Term)>)>,
}

impl TriggerChecker for SemiObliviousChecker {
    fn check(
        &mut self,
        trigger: &Trigger,
        rule: &Rule,
        _facts: &InMemoryFactBase,
        session: &Session,
    ) -> bool {
        let frontier = rule.frontier(session);
        let key = trigger.substitution.restrict_to(&frontier).canonical_key();
        self.treated.insert((trigger.rule_index, key))
    }
}

/// Fire unless the head already has a homomorphism into the current facts
/// extending the trigger substitution.
#[derive(Default)]
pub struct RestrictedChecker {
    semi: SemiObliviousChecker,
}

impl TriggerChecker for RestrictedChecker {
    fn check(
        &mut self,
        trigger: &Trigger,
        rule: &Rule,
        facts: &InMemoryFactBase,
        session: &Session,
    ) -> bool {
        if !self.semi.check(trigger, rule, facts, session) {
            return false;
        }
        !head_satisfied(rule, &trigger.substitution, facts, session)
    }
}

/// Restricted, plus an equivalence guard on the produced head image: the
/// trigger is skipped when an equivalent image already sits in the facts.
#[derive(Default)]
pub struct EquivalentChecker {
    restricted: RestrictedChecker,
}

impl TriggerChecker for EquivalentChecker {
    fn check(
        &mut self,
        trigger: &Trigger,
        rule: &Rule,
        facts: &InMemoryFactBase,
        session: &Session,
    ) -> bool {
        if !self.restricted.check(trigger, rule, facts, session) {
            return false;
        }
        // Piece of the fact base reachable from the frontier images through
        // shared labeled nulls, plus the would-be head image: if that
        // pattern folds into the facts, the image is redundant.
        let frontier = rule.frontier(session);
        let mut pending: Vec<Term> = frontier
            .iter()
            .map(|&v| trigger.substitution.apply_term(Term::Variable(v), session))
            .filter(|&t| session.is_blank(t))
            .collect();
        let mut visited: IndexSet<Term> = IndexSet::new();
        let mut piece: IndexSet<Atom> = IndexSet::new();
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            for atom in facts.iter() {
                if atom.args.contains(&current) && piece.insert(atom.clone()) {
                    for &arg in &atom.args {
                        if session.is_blank(arg) && !visited.contains(&arg) {
                            pending.push(arg);
                        }
                    }
                }
            }
        }
        if piece.is_empty() {
            return true;
        }
        let mut pattern: Vec<Atom> = piece.into_iter().collect();
        for disjunct in 0..rule.head_disjuncts().len() {
            if let Some(atoms) = rule.head_disjunct_atoms(disjunct) {
                for atom in atoms {
                    pattern.push(atom.apply(&trigger.substitution, session));
                }
            }
        }
        let pattern = generalize_blanks(&pattern, session);
        !exist_homomorphism(&pattern, facts, Substitution::new(), session)
    }
}

/// Composite checker: every member must agree.
#[derive(Default)]
pub struct MultiTriggerChecker {
    checkers: Vec<Box<dyn TriggerChecker>>,
}

impl MultiTriggerChecker {
    pub fn new(checkers: Vec<Box<dyn TriggerChecker>>) -> Self {
        MultiTriggerChecker { checkers }
    }
}

impl TriggerChecker for MultiTriggerChecker {
    fn check(
        &mut self,
        trigger: &Trigger,
        rule: &Rule,
        facts: &InMemoryFactBase,
        session: &Session,
    ) -> bool {
        self.checkers
            .iter_mut()
            .all(|c| c.check(trigger, rule, facts, session))
    }
}

/// Is some head disjunct already satisfied under the substitution, with
/// the existential variables free?
pub fn head_satisfied(
    rule: &Rule,
    sub: &Substitution,
    facts: &InMemoryFactBase,
    session: &Session,
) -> bool {
    let frontier = rule.frontier(session);
    let initial = sub.restrict_to(&frontier);
    for disjunct in 0..rule.head_disjuncts().len() {
        if let Some(atoms) = rule.head_disjunct_atoms(disjunct) {
            if exist_homomorphism(&atoms, facts, initial.clone(), session) {
                return true;
            }
        }
    }
    false
}

/// Replace every labeled null by a query variable, consistently, so a
/// homomorphism may fold nulls onto other terms.
fn generalize_blanks(atoms: &[Atom], session: &Session) -> Vec<Atom> {
    let mut mapping: indexmap::IndexMap<Term, Term> = indexmap::IndexMap::new();
    atoms
        .iter()
        .map(|atom| {
            let args: Vec<Term> = atom
                .args
                .iter()
                .map(|&arg| {
                    if session.is_blank(arg) {
                        *mapping
                            .entry(arg)
                            .or_insert_with(|| session.fresh_variable("null"))
                    } else {
                        arg
                    }
                })
                .collect();
            Atom::new(atom.predicate, args)
        })
        .collect()
}
