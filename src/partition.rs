//! Term partitions: union-find over terms.
//!
//! Partitions are the working state of piece unifiers and of equality
//! handling in conjunctive evaluation. A partition is *admissible* when no
//! class contains two distinct ground terms; it is *valid* for a rule when
//! existential variables stay isolated from ground terms, frontier
//! variables and answer variables.

use indexmap::{IndexMap, IndexSet};
use petgraph::unionfind::UnionFind;

use crate::id::VarId;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// A union-find over terms. Terms are registered lazily on first use; the
/// union log makes merging two partitions a replay.
#[derive(Clone, Debug)]
pub struct TermPartition {
    slots: IndexMap<Term, usize>,
    uf: UnionFind<usize>,
    capacity: usize,
    unions: Vec<(Term, Term)>,
}

impl Default for TermPartition {
    fn default() -> Self {
        Self::new()
    }
}

impl TermPartition {
    pub fn new() -> Self {
        TermPartition {
            slots: IndexMap::new(),
            uf: UnionFind::new(16),
            capacity: 16,
            unions: Vec::new(),
        }
    }

    /// Build from explicit classes (mainly for tests).
    pub fn from_classes<I, C>(classes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: IntoIterator<Item = Term>,
    {
        let mut partition = TermPartition::new();
        for class in classes {
            let mut previous: Option<Term> = None;
            for term in class {
                if let Some(p) = previous {
                    partition.union(p, term);
                } else {
                    partition.touch(term);
                }
                previous = Some(term);
            }
        }
        partition
    }

    fn slot(&mut self, term: Term) -> usize {
        if let Some(&slot) = self.slots.get(&term) {
            return slot;
        }
        let slot = self.slots.len();
        if slot >= self.capacity {
            // UnionFind is fixed-size: rebuild at double capacity and replay.
            self.capacity = (self.capacity * 2).max(16);
            let mut uf = UnionFind::new(self.capacity);
            for (a, b) in &self.unions {
                let sa = self.slots[a];
                let sb = self.slots[b];
                uf.union(sa, sb);
            }
            self.uf = uf;
        }
        self.slots.insert(term, slot);
        slot
    }

    /// Register a term in its own class.
    pub fn touch(&mut self, term: Term) {
        self.slot(term);
    }

    /// Merge the classes of two terms.
    pub fn union(&mut self, a: Term, b: Term) {
        let sa = self.slot(a);
        let sb = self.slot(b);
        self.uf.union(sa, sb);
        self.unions.push((a, b));
    }

    /// True iff both terms are registered and share a class.
    pub fn same_class(&self, a: Term, b: Term) -> bool {
        match (self.slots.get(&a), self.slots.get(&b)) {
            (Some(&sa), Some(&sb)) => self.uf.find(sa) == self.uf.find(sb),
            _ => a == b,
        }
    }

    /// Replay another partition's unions into this one.
    pub fn join(&mut self, other: &TermPartition) {
        for term in other.slots.keys() {
            self.touch(*term);
        }
        for &(a, b) in &other.unions {
            self.union(a, b);
        }
    }

    /// The classes, each in registration order.
    pub fn classes(&self) -> Vec<Vec<Term>> {
        let mut by_root: IndexMap<usize, Vec<Term>> = IndexMap::new();
        for (&term, &slot) in &self.slots {
            by_root.entry(self.uf.find(slot)).or_default().push(term);
        }
        by_root.into_values().collect()
    }

    /// The class of a term (the term alone when unregistered).
    pub fn class_of(&self, term: Term) -> Vec<Term> {
        match self.slots.get(&term) {
            None => vec![term],
            Some(&slot) => {
                let root = self.uf.find(slot);
                self.slots
                    .iter()
                    .filter(|(_, &s)| self.uf.find(s) == root)
                    .map(|(&t, _)| t)
                    .collect()
            }
        }
    }

    /// No class holds two distinct ground terms.
    pub fn is_admissible(&self, session: &Session) -> bool {
        for class in self.classes() {
            let mut ground: Option<Term> = None;
            for term in class {
                if session.is_ground(term) {
                    match ground {
                        Some(g) if g != term => return false,
                        _ => ground = Some(term),
                    }
                }
            }
        }
        true
    }

    /// Validity against a rule (existential isolation).
    ///
    /// Per class: at most one ground term; an existential variable of the
    /// rule may share a class with neither a ground term, another
    /// existential, a frontier variable, nor an answer variable of the
    /// query.
    pub fn is_valid(
        &self,
        existentials: &IndexSet<VarId>,
        frontier: &IndexSet<VarId>,
        answer_vars: &IndexSet<VarId>,
        session: &Session,
    ) -> bool {
        for class in self.classes() {
            let (mut has_ground, mut has_exist, mut has_frontier, mut has_answer) =
                (false, false, false, false);
            for term in class {
                if session.is_ground(term) {
                    if has_ground || has_exist {
                        return false;
                    }
                    has_ground = true;
                } else if let Term::Variable(v) = term {
                    if existentials.contains(&v) {
                        if has_exist || has_frontier || has_ground || has_answer {
                            return false;
                        }
                        has_exist = true;
                    } else if frontier.contains(&v) {
                        if has_exist {
                            return false;
                        }
                        has_frontier = true;
                    } else if answer_vars.contains(&v) {
                        if has_exist {
                            return false;
                        }
                        has_answer = true;
                    }
                }
            }
        }
        true
    }

    /// Elect a representative for the class of `term`.
    ///
    /// Ground terms win; then answer variables of the context, then other
    /// context variables, then anything else.
    pub fn representative(
        &self,
        term: Term,
        answer_vars: &IndexSet<VarId>,
        context_vars: &IndexSet<VarId>,
        session: &Session,
    ) -> Term {
        let class = self.class_of(term);
        let mut best = class[0];
        let mut best_rank = rank(best, answer_vars, context_vars, session);
        for &candidate in &class[1..] {
            let r = rank(candidate, answer_vars, context_vars, session);
            if r > best_rank {
                best = candidate;
                best_rank = r;
            }
        }
        best
    }

    /// The substitution sending every variable of each class to the class
    /// representative. `None` when some class identifies two distinct
    /// ground terms.
    pub fn associated_substitution(
        &self,
        answer_vars: &IndexSet<VarId>,
        context_vars: &IndexSet<VarId>,
        session: &Session,
    ) -> Option<Substitution> {
        let mut sub = Substitution::new();
        for class in self.classes() {
            let mut ground: Option<Term> = None;
            for &term in &class {
                if session.is_ground(term) {
                    match ground {
                        Some(g) if g != term => return None,
                        _ => ground = Some(term),
                    }
                }
            }
            let rep = self.representative(class[0], answer_vars, context_vars, session);
            for &term in &class {
                if let Term::Variable(v) = term {
                    if term != rep {
                        sub.bind(v, rep);
                    }
                }
            }
        }
        Some(sub)
    }

    pub fn display(&self, session: &Session) -> String {
        let classes: Vec<String> = self
            .classes()
            .iter()
            .map(|class| {
                let terms: Vec<String> =
                    class.iter().map(|&t| session.display_term(t)).collect();
                format!("{{{}}}", terms.join(", "))
            })
            .collect();
        format!("[{}]", classes.join(", "))
    }
}

fn rank(
    term: Term,
    answer_vars: &IndexSet<VarId>,
    context_vars: &IndexSet<VarId>,
    session: &Session,
) -> u8 {
    if session.is_ground(term) {
        3
    } else if let Term::Variable(v) = term {
        if answer_vars.contains(&v) {
            2
        } else if context_vars.contains(&v) {
            1
        } else {
            0
        }
    } else {
        0
    }
}
