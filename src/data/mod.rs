//! The readable-data protocol.
//!
//! Any backend (the in-memory fact base, the computed-function source, the
//! comparison source, an external store) answers [`BasicQuery`]s with
//! streamed tuples and publishes an [`AtomicPattern`] describing which
//! positions must be bound before evaluation. The evaluator layer never
//! touches storage directly; it routes every atom through this protocol.

pub mod comparison;
pub mod computed;
pub mod fact_base;

use std::collections::{BTreeMap, BTreeSet};

use crate::atom::Atom;
use crate::id::{PredId, VarId};
use crate::rule::Rule;
use crate::session::Session;
use crate::term::Term;

/// A data-source evaluation failure, carrying the source identity.
#[derive(Clone, Debug)]
pub struct EvaluationError {
    pub source: String,
    pub message: String,
}

impl EvaluationError {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        EvaluationError {
            source: source.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evaluation error in source '{}': {}", self.source, self.message)
    }
}

impl std::error::Error for EvaluationError {}

/// A single-predicate query: some positions bound to ground terms, some
/// positions projected out as answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicQuery {
    pub predicate: PredId,
    /// Bound positions; the terms must be ground at evaluation time.
    pub bound: BTreeMap<usize, Term>,
    /// Answer positions; tuples are yielded in key order.
    pub answers: BTreeMap<usize, VarId>,
}

impl BasicQuery {
    pub fn new(predicate: PredId) -> Self {
        BasicQuery {
            predicate,
            bound: BTreeMap::new(),
            answers: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, position: usize, term: Term) -> Self {
        self.bound.insert(position, term);
        self
    }

    pub fn answer(mut self, position: usize, var: VarId) -> Self {
        self.answers.insert(position, var);
        self
    }

    pub fn bound_term(&self, position: usize) -> Option<Term> {
        self.bound.get(&position).copied()
    }

    /// The answer positions, in key order (the tuple layout).
    pub fn answer_positions(&self) -> Vec<usize> {
        self.answers.keys().copied().collect()
    }
}

/// Per-position type constraint of a data source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PositionConstraint {
    Ground,
    Constant,
    Variable,
    Literal,
    Any,
}

impl PositionConstraint {
    fn admits(self, term: Term, session: &Session) -> bool {
        match self {
            PositionConstraint::Any => true,
            PositionConstraint::Ground => session.is_ground(term),
            PositionConstraint::Constant => matches!(term, Term::Constant(_)),
            PositionConstraint::Literal => matches!(term, Term::Literal(_)),
            PositionConstraint::Variable => matches!(term, Term::Variable(_)),
        }
    }
}

/// The pattern a data source publishes for one of its predicates: positions
/// that must be bound before evaluation, and per-position type constraints.
#[derive(Clone, Debug, Default)]
pub struct AtomicPattern {
    pub mandatory: BTreeSet<usize>,
    pub allowed: BTreeMap<usize, PositionConstraint>,
}

impl AtomicPattern {
    /// Pattern with no constraints.
    pub fn unconstrained() -> Self {
        AtomicPattern::default()
    }

    /// Pattern requiring the given positions to be ground.
    pub fn ground_at(positions: impl IntoIterator<Item = usize>) -> Self {
        let mandatory: BTreeSet<usize> = positions.into_iter().collect();
        let allowed = mandatory
            .iter()
            .map(|&p| (p, PositionConstraint::Ground))
            .collect();
        AtomicPattern { mandatory, allowed }
    }

    /// True iff the query binds every mandatory position and every bound
    /// term satisfies its type constraint.
    pub fn admits(&self, query: &BasicQuery, session: &Session) -> bool {
        if !self.mandatory.iter().all(|p| query.bound.contains_key(p)) {
            return false;
        }
        query.bound.iter().all(|(pos, &term)| {
            self.allowed
                .get(pos)
                .copied()
                .unwrap_or(PositionConstraint::Any)
                .admits(term, session)
        })
    }
}

/// Lazily yielded answer tuples.
pub type TupleIter<'a> = Box<dyn Iterator<Item = Vec<Term>> + 'a>;

/// The unifying data-source capability.
pub trait ReadableData {
    /// Source identity, used in evaluation errors.
    fn name(&self) -> &str;

    /// The predicates this source answers for. Sources with open predicate
    /// families (e.g. computed functions) may return an empty list and rely
    /// on [`ReadableData::has_predicate`].
    fn predicates(&self) -> Vec<PredId>;

    fn has_predicate(&self, session: &Session, predicate: PredId) -> bool;

    fn pattern(&self, session: &Session, predicate: PredId) -> Option<AtomicPattern>;

    /// Whether the query binds enough positions to be answered now.
    fn can_evaluate(&self, session: &Session, query: &BasicQuery) -> bool {
        match self.pattern(session, query.predicate) {
            Some(pattern) => pattern.admits(query, session),
            None => false,
        }
    }

    /// Stream the answer tuples, in answer-position key order. Result order
    /// is unspecified; callers must not depend on it.
    fn evaluate<'a>(
        &'a self,
        session: &'a Session,
        query: &BasicQuery,
    ) -> Result<TupleIter<'a>, EvaluationError>;

    /// A cheap upper bound on the result count, without evaluating.
    fn estimate_bound(&self, session: &Session, query: &BasicQuery) -> Option<usize>;

    /// The materialized term domain, when this source can enumerate it.
    fn terms(&self) -> Option<Vec<Term>> {
        None
    }
}

/// Full per-predicate enumeration.
pub trait MaterializedData: ReadableData {
    fn enumerate<'a>(&'a self, predicate: PredId) -> Box<dyn Iterator<Item = &'a Atom> + 'a>;
}

/// Mutation capability.
pub trait WritableData {
    /// Add an atom; returns whether it was new.
    fn add(&mut self, atom: Atom) -> bool;
    /// Remove an atom from every index; returns whether it was present.
    fn remove(&mut self, atom: &Atom) -> bool;
}

/// Which atoms a store considers valid.
pub trait AtomAcceptance {
    fn accepts(&self, atom: &Atom, session: &Session) -> bool;
}

/// A store that can saturate itself under a set of plain datalog rules,
/// instead of having the chase drive it trigger by trigger.
pub trait DatalogDelegable {
    /// Apply the rules to fixpoint; returns the created atoms.
    fn delegate_rules(&mut self, rules: &[Rule], session: &Session) -> Vec<Atom>;
}

/// An ordered federation of data sources. Atoms route to the first source
/// that knows their predicate.
#[derive(Clone)]
pub struct DataContext<'a> {
    sources: Vec<&'a dyn ReadableData>,
}

impl<'a> DataContext<'a> {
    pub fn new(sources: Vec<&'a dyn ReadableData>) -> Self {
        DataContext { sources }
    }

    pub fn single(source: &'a dyn ReadableData) -> Self {
        DataContext {
            sources: vec![source],
        }
    }

    pub fn sources(&self) -> &[&'a dyn ReadableData] {
        &self.sources
    }

    /// The source responsible for a predicate.
    pub fn route(&self, session: &Session, predicate: PredId) -> Option<&'a dyn ReadableData> {
        self.sources
            .iter()
            .copied()
            .find(|s| s.has_predicate(session, predicate))
    }

    /// The union of the materialized term domains. `None` when no source
    /// can enumerate its terms.
    pub fn terms(&self) -> Option<Vec<Term>> {
        let mut out: Vec<Term> = Vec::new();
        let mut any = false;
        for source in &self.sources {
            if let Some(terms) = source.terms() {
                any = true;
                for t in terms {
                    if !out.contains(&t) {
                        out.push(t);
                    }
                }
            }
        }
        any.then_some(out)
    }
}
