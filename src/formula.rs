//! First-order formulas and queries.
//!
//! [`Formula`] is the sum type over atoms, connectives and quantifiers.
//! Equality and comparisons are plain atoms over the reserved predicates.
//! [`ConjunctiveQuery`] is the atom-conjunction restriction used by
//! homomorphism search, piece unifiers and rewriting; [`UnionQuery`] is an
//! ordered union of conjunctive queries sharing an answer signature.

use std::hash::{Hash, Hasher};

use indexmap::IndexSet;

use crate::atom::{Atom, AtomSet};
use crate::id::VarId;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// A first-order formula.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Formula {
    Atom(Atom),
    Conjunction(Vec<Formula>),
    Disjunction(Vec<Formula>),
    Negation(Box<Formula>),
    Existential(Vec<VarId>, Box<Formula>),
    Universal(Vec<VarId>, Box<Formula>),
}

/// The connective kinds, used as registry keys by the evaluator layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FormulaKind {
    Atom,
    Conjunction,
    Disjunction,
    Negation,
    Existential,
    Universal,
}

impl Formula {
    pub fn kind(&self) -> FormulaKind {
        match self {
            Formula::Atom(_) => FormulaKind::Atom,
            Formula::Conjunction(_) => FormulaKind::Conjunction,
            Formula::Disjunction(_) => FormulaKind::Disjunction,
            Formula::Negation(_) => FormulaKind::Negation,
            Formula::Existential(_, _) => FormulaKind::Existential,
            Formula::Universal(_, _) => FormulaKind::Universal,
        }
    }

    /// Conjunction of atoms, flattening singletons.
    pub fn conjunction_of(atoms: impl IntoIterator<Item = Atom>) -> Formula {
        let mut formulas: Vec<Formula> = atoms.into_iter().map(Formula::Atom).collect();
        if formulas.len() == 1 {
            formulas.pop().expect("length checked")
        } else {
            Formula::Conjunction(formulas)
        }
    }

    /// The free variables, in first-occurrence order.
    pub fn free_variables(&self, session: &Session) -> IndexSet<VarId> {
        let mut out = IndexSet::new();
        self.collect_free_variables(session, &mut IndexSet::new(), &mut out);
        out
    }

    fn collect_free_variables(
        &self,
        session: &Session,
        bound: &mut IndexSet<VarId>,
        out: &mut IndexSet<VarId>,
    ) {
        match self {
            Formula::Atom(atom) => {
                for v in atom.variables(session) {
                    if !bound.contains(&v) {
                        out.insert(v);
                    }
                }
            }
            Formula::Conjunction(xs) | Formula::Disjunction(xs) => {
                for x in xs {
                    x.collect_free_variables(session, bound, out);
                }
            }
            Formula::Negation(x) => x.collect_free_variables(session, bound, out),
            Formula::Existential(vars, x) | Formula::Universal(vars, x) => {
                let added: Vec<VarId> =
                    vars.iter().copied().filter(|v| bound.insert(*v)).collect();
                x.collect_free_variables(session, bound, out);
                for v in added {
                    bound.shift_remove(&v);
                }
            }
        }
    }

    /// The atoms of the formula, in syntactic order.
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Formula::Atom(atom) => out.push(atom),
            Formula::Conjunction(xs) | Formula::Disjunction(xs) => {
                for x in xs {
                    x.collect_atoms(out);
                }
            }
            Formula::Negation(x) => x.collect_atoms(out),
            Formula::Existential(_, x) | Formula::Universal(_, x) => x.collect_atoms(out),
        }
    }

    /// Image under a substitution. Quantified variables are shielded.
    pub fn apply(&self, sub: &Substitution, session: &Session) -> Formula {
        match self {
            Formula::Atom(atom) => Formula::Atom(atom.apply(sub, session)),
            Formula::Conjunction(xs) => {
                Formula::Conjunction(xs.iter().map(|x| x.apply(sub, session)).collect())
            }
            Formula::Disjunction(xs) => {
                Formula::Disjunction(xs.iter().map(|x| x.apply(sub, session)).collect())
            }
            Formula::Negation(x) => Formula::Negation(Box::new(x.apply(sub, session))),
            Formula::Existential(vars, x) => {
                let shielded = shield(sub, vars);
                Formula::Existential(vars.clone(), Box::new(x.apply(&shielded, session)))
            }
            Formula::Universal(vars, x) => {
                let shielded = shield(sub, vars);
                Formula::Universal(vars.clone(), Box::new(x.apply(&shielded, session)))
            }
        }
    }

    /// Flatten nested conjunctions into a list of conjuncts.
    pub fn flatten_conjunction(&self) -> Vec<&Formula> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a Formula>) {
        match self {
            Formula::Conjunction(xs) => {
                for x in xs {
                    x.flatten_into(out);
                }
            }
            other => out.push(other),
        }
    }

    /// View as a conjunction of atoms, if that is all the formula is.
    pub fn as_atom_conjunction(&self) -> Option<Vec<Atom>> {
        let mut atoms = Vec::new();
        for part in self.flatten_conjunction() {
            match part {
                Formula::Atom(a) => atoms.push(a.clone()),
                _ => return None,
            }
        }
        Some(atoms)
    }

    pub fn display(&self, session: &Session) -> String {
        match self {
            Formula::Atom(a) => a.display(session),
            Formula::Conjunction(xs) => {
                let parts: Vec<String> = xs.iter().map(|x| x.display(session)).collect();
                parts.join(", ")
            }
            Formula::Disjunction(xs) => {
                let parts: Vec<String> = xs.iter().map(|x| x.display(session)).collect();
                format!("({})", parts.join(" | "))
            }
            Formula::Negation(x) => format!("not {}", x.display(session)),
            Formula::Existential(vars, x) => {
                let names: Vec<String> =
                    vars.iter().map(|&v| session.variable_name(v)).collect();
                format!("exists {}. {}", names.join(", "), x.display(session))
            }
            Formula::Universal(vars, x) => {
                let names: Vec<String> =
                    vars.iter().map(|&v| session.variable_name(v)).collect();
                format!("forall {}. {}", names.join(", "), x.display(session))
            }
        }
    }
}

fn shield(sub: &Substitution, vars: &[VarId]) -> Substitution {
    let mut shielded = sub.clone();
    for &v in vars {
        shielded.remove(v);
    }
    shielded
}

/// A malformed query or rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// An answer variable does not occur free in the body.
    AnswerVariableNotFree(String),
    /// A head variable is neither a frontier nor an existential variable.
    UnboundHeadVariable(String),
    /// The formula does not fit the expected fragment.
    FragmentMismatch(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::AnswerVariableNotFree(v) => {
                write!(f, "answer variable {v} is not free in the query body")
            }
            ValidationError::UnboundHeadVariable(v) => {
                write!(f, "head variable {v} does not occur in the rule body")
            }
            ValidationError::FragmentMismatch(s) => write!(f, "fragment mismatch: {s}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A first-order query: an ordered answer signature over a formula body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FOQuery {
    pub answer_variables: Vec<VarId>,
    pub body: Formula,
}

impl FOQuery {
    /// Build a query, checking that every answer variable is free in the
    /// body.
    pub fn new(
        answer_variables: Vec<VarId>,
        body: Formula,
        session: &Session,
    ) -> Result<Self, ValidationError> {
        let free = body.free_variables(session);
        for &v in &answer_variables {
            if !free.contains(&v) {
                return Err(ValidationError::AnswerVariableNotFree(
                    session.variable_name(v),
                ));
            }
        }
        Ok(FOQuery {
            answer_variables,
            body,
        })
    }

    /// Boolean query (no answer variables).
    pub fn boolean(body: Formula) -> Self {
        FOQuery {
            answer_variables: Vec::new(),
            body,
        }
    }

    /// Wildcard projection: all free variables, ordered by identifier.
    pub fn wildcard(body: Formula, session: &Session) -> Self {
        let mut vars: Vec<VarId> = body.free_variables(session).into_iter().collect();
        vars.sort_unstable();
        FOQuery {
            answer_variables: vars,
            body,
        }
    }
}

/// A conjunctive query: a set of atoms plus an ordered answer signature.
///
/// Atom order is preserved for scheduling hints; equality and hashing are
/// order-independent.
#[derive(Clone, Debug)]
pub struct ConjunctiveQuery {
    atoms: Vec<Atom>,
    pub answer_variables: Vec<VarId>,
}

impl PartialEq for ConjunctiveQuery {
    fn eq(&self, other: &Self) -> bool {
        if self.answer_variables != other.answer_variables
            || self.atoms.len() != other.atoms.len()
        {
            return false;
        }
        self.atoms.iter().all(|a| other.atoms.contains(a))
    }
}

impl Eq for ConjunctiveQuery {}

impl Hash for ConjunctiveQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.answer_variables.hash(state);
        // Order-independent combination of the atom hashes.
        let mut acc: u64 = 0;
        for atom in &self.atoms {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            atom.hash(&mut h);
            acc = acc.wrapping_add(h.finish());
        }
        acc.hash(state);
    }
}

impl ConjunctiveQuery {
    /// Build a conjunctive query, deduplicating atoms and keeping first
    /// occurrences in order.
    pub fn new(atoms: impl IntoIterator<Item = Atom>, answer_variables: Vec<VarId>) -> Self {
        let mut seen: AtomSet = AtomSet::new();
        let mut ordered = Vec::new();
        for atom in atoms {
            if seen.insert(atom.clone()) {
                ordered.push(atom);
            }
        }
        ConjunctiveQuery {
            atoms: ordered,
            answer_variables,
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom_set(&self) -> AtomSet {
        self.atoms.iter().cloned().collect()
    }

    pub fn is_boolean(&self) -> bool {
        self.answer_variables.is_empty()
    }

    /// All variables, in first-occurrence order.
    pub fn variables(&self, session: &Session) -> IndexSet<VarId> {
        let mut vars = IndexSet::new();
        for atom in &self.atoms {
            for &arg in &atom.args {
                session.term_variables(arg, &mut vars);
            }
        }
        vars
    }

    /// Variables that are not answer variables.
    pub fn existential_variables(&self, session: &Session) -> IndexSet<VarId> {
        let answers: IndexSet<VarId> = self.answer_variables.iter().copied().collect();
        self.variables(session)
            .into_iter()
            .filter(|v| !answers.contains(v))
            .collect()
    }

    /// Image under a substitution.
    ///
    /// Answer variables mapped to other variables are renamed in the
    /// signature; answer variables mapped to ground terms stay in the
    /// signature and an equality atom pins them to their image.
    pub fn apply(&self, sub: &Substitution, session: &Session) -> ConjunctiveQuery {
        let mut atoms: Vec<Atom> = self.atoms.iter().map(|a| a.apply(sub, session)).collect();
        let mut answers = Vec::with_capacity(self.answer_variables.len());
        for &v in &self.answer_variables {
            match sub.apply_term(Term::Variable(v), session) {
                Term::Variable(w) => answers.push(w),
                ground => {
                    let eq = session.equality_predicate();
                    atoms.push(Atom::new(eq, vec![Term::Variable(v), ground]));
                    answers.push(v);
                }
            }
        }
        ConjunctiveQuery::new(atoms, answers)
    }

    /// The body as a formula.
    pub fn to_formula(&self) -> Formula {
        Formula::conjunction_of(self.atoms.iter().cloned())
    }

    /// The query as a first-order query.
    pub fn to_fo_query(&self) -> FOQuery {
        FOQuery {
            answer_variables: self.answer_variables.clone(),
            body: self.to_formula(),
        }
    }

    /// View a first-order query as conjunctive, when its body is a
    /// conjunction of atoms.
    pub fn from_fo_query(query: &FOQuery) -> Option<ConjunctiveQuery> {
        let atoms = query.body.as_atom_conjunction()?;
        Some(ConjunctiveQuery::new(
            atoms,
            query.answer_variables.clone(),
        ))
    }

    pub fn display(&self, session: &Session) -> String {
        let answers: Vec<String> = self
            .answer_variables
            .iter()
            .map(|&v| session.variable_name(v))
            .collect();
        let atoms: Vec<String> = self.atoms.iter().map(|a| a.display(session)).collect();
        format!("?({}) :- {}", answers.join(", "), atoms.join(", "))
    }
}

/// A union of conjunctive queries sharing an answer signature.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnionQuery {
    cqs: Vec<ConjunctiveQuery>,
    pub answer_variables: Vec<VarId>,
}

impl UnionQuery {
    pub fn new(
        cqs: impl IntoIterator<Item = ConjunctiveQuery>,
        answer_variables: Vec<VarId>,
    ) -> Self {
        let mut out = UnionQuery {
            cqs: Vec::new(),
            answer_variables,
        };
        for cq in cqs {
            out.insert(cq);
        }
        out
    }

    pub fn empty(answer_variables: Vec<VarId>) -> Self {
        UnionQuery {
            cqs: Vec::new(),
            answer_variables,
        }
    }

    /// Insert a disjunct, ignoring duplicates. Returns whether it was new.
    pub fn insert(&mut self, cq: ConjunctiveQuery) -> bool {
        if self.cqs.contains(&cq) {
            return false;
        }
        self.cqs.push(cq);
        true
    }

    pub fn conjunctive_queries(&self) -> &[ConjunctiveQuery] {
        &self.cqs
    }

    pub fn len(&self) -> usize {
        self.cqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cqs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConjunctiveQuery> {
        self.cqs.iter()
    }

    /// All variables of all disjuncts.
    pub fn variables(&self, session: &Session) -> IndexSet<VarId> {
        let mut vars = IndexSet::new();
        for cq in &self.cqs {
            vars.extend(cq.variables(session));
        }
        vars
    }

    /// Union in place.
    pub fn extend(&mut self, other: UnionQuery) {
        for cq in other.cqs {
            self.insert(cq);
        }
    }
}
