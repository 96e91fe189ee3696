//! In-memory fact bases with term and predicate indexes.

use std::collections::HashMap;


use crate::atom::{Atom, AtomSet};
use crate::data::{
    AtomicPattern, BasicQuery, DatalogDelegable, EvaluationError, MaterializedData, ReadableData,
    TupleIter, WritableData,
};
use crate::homomorphism::homomorphisms;
use crate::id::PredId;
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// A set of ground atoms indexed by predicate, by (predicate, position,
/// term), and by term.
///
/// Not thread-safe; share behind external synchronization if needed.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFactBase {
    atoms: AtomSet,
    by_predicate: HashMap<PredId, AtomSet>,
    by_position: HashMap<(PredId, usize, Term), AtomSet>,
    by_term: HashMap<Term, AtomSet>,
}

impl InMemoryFactBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_atoms(atoms: impl IntoIterator<Item = Atom>) -> Self {
        let mut base = Self::new();
        for atom in atoms {
            base.add(atom);
        }
        base
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.atoms.contains(atom)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn atoms(&self) -> &AtomSet {
        &self.atoms
    }

    /// The atoms stored under a predicate.
    pub fn atoms_of(&self, predicate: PredId) -> impl Iterator<Item = &Atom> {
        self.by_predicate
            .get(&predicate)
            .into_iter()
            .flat_map(|s| s.iter())
    }

    /// The candidate set for a basic query: the smallest applicable index.
    fn candidates(&self, query: &BasicQuery) -> Option<&AtomSet> {
        let mut best = self.by_predicate.get(&query.predicate)?;
        for (&pos, &term) in &query.bound {
            match self.by_position.get(&(query.predicate, pos, term)) {
                None => return None,
                Some(set) if set.len() < best.len() => best = set,
                Some(_) => {}
            }
        }
        Some(best)
    }
}

impl ReadableData for InMemoryFactBase {
    fn name(&self) -> &str {
        "in-memory-fact-base"
    }

    fn predicates(&self) -> Vec<PredId> {
        self.by_predicate.keys().copied().collect()
    }

    fn has_predicate(&self, _session: &Session, predicate: PredId) -> bool {
        self.by_predicate.contains_key(&predicate)
    }

    fn pattern(&self, _session: &Session, predicate: PredId) -> Option<AtomicPattern> {
        self.by_predicate
            .contains_key(&predicate)
            .then(AtomicPattern::unconstrained)
    }

    fn evaluate<'a>(
        &'a self,
        _session: &'a Session,
        query: &BasicQuery,
    ) -> Result<TupleIter<'a>, EvaluationError> {
        let candidates = match self.candidates(query) {
            Some(set) => set,
            None => return Ok(Box::new(std::iter::empty())),
        };
        let query = query.clone();
        let answer_positions = query.answer_positions();
        Ok(Box::new(candidates.iter().filter_map(move |atom| {
            for (&pos, &term) in &query.bound {
                if atom.args.get(pos) != Some(&term) {
                    return None;
                }
            }
            Some(
                answer_positions
                    .iter()
                    .map(|&pos| atom.args[pos])
                    .collect::<Vec<Term>>(),
            )
        })))
    }

    fn estimate_bound(&self, _session: &Session, query: &BasicQuery) -> Option<usize> {
        Some(self.candidates(query).map_or(0, |set| set.len()))
    }

    fn terms(&self) -> Option<Vec<Term>> {
        Some(self.by_term.keys().copied().collect())
    }
}

impl MaterializedData for InMemoryFactBase {
    fn enumerate<'a>(&'a self, predicate: PredId) -> Box<dyn Iterator<Item = &'a Atom> + 'a> {
        Box::new(self.atoms_of(predicate))
    }
}

impl WritableData for InMemoryFactBase {
    fn add(&mut self, atom: Atom) -> bool {
        if !self.atoms.insert(atom.clone()) {
            return false;
        }
        self.by_predicate
            .entry(atom.predicate)
            .or_default()
            .insert(atom.clone());
        for (pos, &term) in atom.args.iter().enumerate() {
            self.by_position
                .entry((atom.predicate, pos, term))
                .or_default()
                .insert(atom.clone());
            self.by_term.entry(term).or_default().insert(atom.clone());
        }
        true
    }

    fn remove(&mut self, atom: &Atom) -> bool {
        if !self.atoms.shift_remove(atom) {
            return false;
        }
        if let Some(set) = self.by_predicate.get_mut(&atom.predicate) {
            set.shift_remove(atom);
        }
        for (pos, &term) in atom.args.iter().enumerate() {
            if let Some(set) = self.by_position.get_mut(&(atom.predicate, pos, term)) {
                set.shift_remove(atom);
            }
            if let Some(set) = self.by_term.get_mut(&term) {
                set.shift_remove(atom);
                if set.is_empty() {
                    self.by_term.remove(&term);
                }
            }
        }
        true
    }
}

impl crate::data::AtomAcceptance for InMemoryFactBase {
    fn accepts(&self, atom: &Atom, session: &Session) -> bool {
        atom.is_ground(session)
    }
}

impl DatalogDelegable for InMemoryFactBase {
    /// Naive fixpoint over plain conjunctive rules, entirely inside the
    /// store.
    fn delegate_rules(&mut self, rules: &[Rule], session: &Session) -> Vec<Atom> {
        let mut created = Vec::new();
        loop {
            let mut new_atoms: Vec<Atom> = Vec::new();
            for rule in rules {
                let body = rule.positive_body();
                let head = match rule.head.as_atom_conjunction() {
                    Some(atoms) => atoms,
                    None => continue,
                };
                for sub in homomorphisms(&body, self, Substitution::new(), session) {
                    for atom in &head {
                        let image = atom.apply(&sub, session);
                        if image.is_ground(session) && !self.contains(&image) {
                            new_atoms.push(image);
                        }
                    }
                }
            }
            let mut changed = false;
            for atom in new_atoms {
                if self.add(atom.clone()) {
                    created.push(atom);
                    changed = true;
                }
            }
            if !changed {
                return created;
            }
        }
    }
}

/// A fact base that forbids mutation after construction.
#[derive(Clone, Debug)]
pub struct FrozenFactBase {
    inner: InMemoryFactBase,
}

impl FrozenFactBase {
    pub fn new(atoms: impl IntoIterator<Item = Atom>) -> Self {
        FrozenFactBase {
            inner: InMemoryFactBase::from_atoms(atoms),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.inner.contains(atom)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.inner.iter()
    }
}

impl ReadableData for FrozenFactBase {
    fn name(&self) -> &str {
        "frozen-fact-base"
    }

    fn predicates(&self) -> Vec<PredId> {
        self.inner.predicates()
    }

    fn has_predicate(&self, session: &Session, predicate: PredId) -> bool {
        self.inner.has_predicate(session, predicate)
    }

    fn pattern(&self, session: &Session, predicate: PredId) -> Option<AtomicPattern> {
        self.inner.pattern(session, predicate)
    }

    fn evaluate<'a>(
        &'a self,
        session: &'a Session,
        query: &BasicQuery,
    ) -> Result<TupleIter<'a>, EvaluationError> {
        self.inner.evaluate(session, query)
    }

    fn estimate_bound(&self, session: &Session, query: &BasicQuery) -> Option<usize> {
        self.inner.estimate_bound(session, query)
    }

    fn terms(&self) -> Option<Vec<Term>> {
        self.inner.terms()
    }
}

impl MaterializedData for FrozenFactBase {
    fn enumerate<'a>(&'a self, predicate: PredId) -> Box<dyn Iterator<Item = &'a Atom> + 'a> {
        self.inner.enumerate(predicate)
    }
}

/// Conjunctive-query evaluation shorthand: project each homomorphism of
/// `query` onto the answer signature.
pub fn evaluate_cq<'a>(
    query: &'a crate::formula::ConjunctiveQuery,
    data: &'a dyn ReadableData,
    session: &'a Session,
) -> impl Iterator<Item = Vec<Term>> + 'a {
    homomorphisms(query.atoms(), data, Substitution::new(), session).map(move |sub| {
        query
            .answer_variables
            .iter()
            .map(|&v| sub.apply_term(Term::Variable(v), session))
            .collect()
    })
}
