//! Atoms: a predicate applied to a flat sequence of terms.

use indexmap::IndexSet;

use crate::id::{PredId, VarId};
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// An immutable atom. The argument count always equals the predicate arity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Atom {
    pub predicate: PredId,
    pub args: Vec<Term>,
}

/// An insertion-ordered set of atoms.
pub type AtomSet = IndexSet<Atom>;

impl Atom {
    pub fn new(predicate: PredId, args: Vec<Term>) -> Self {
        Atom { predicate, args }
    }

    /// The variables occurring in the atom, in argument order.
    pub fn variables(&self, session: &Session) -> IndexSet<VarId> {
        let mut vars = IndexSet::new();
        for &arg in &self.args {
            session.term_variables(arg, &mut vars);
        }
        vars
    }

    /// True iff no argument contains a variable.
    pub fn is_ground(&self, session: &Session) -> bool {
        self.args.iter().all(|&a| session.is_ground(a))
    }

    /// True iff some argument contains an evaluable function term.
    pub fn contains_evaluable(&self, session: &Session) -> bool {
        self.args.iter().any(|&a| session.contains_evaluable(a))
    }

    /// Image of the atom under a substitution.
    pub fn apply(&self, sub: &Substitution, session: &Session) -> Atom {
        Atom {
            predicate: self.predicate,
            args: self
                .args
                .iter()
                .map(|&a| sub.apply_term(a, session))
                .collect(),
        }
    }

    pub fn display(&self, session: &Session) -> String {
        let args: Vec<String> = self.args.iter().map(|&a| session.display_term(a)).collect();
        format!("{}({})", session.predicate_name(self.predicate), args.join(", "))
    }
}

/// The variables of a set of atoms, in first-occurrence order.
pub fn atom_set_variables(atoms: &AtomSet, session: &Session) -> IndexSet<VarId> {
    let mut vars = IndexSet::new();
    for atom in atoms {
        for &arg in &atom.args {
            session.term_variables(arg, &mut vars);
        }
    }
    vars
}

/// The predicates of a set of atoms.
pub fn atom_set_predicates(atoms: &AtomSet) -> IndexSet<PredId> {
    atoms.iter().map(|a| a.predicate).collect()
}

/// Image of a set of atoms under a substitution, preserving order.
pub fn apply_to_atom_set(sub: &Substitution, atoms: &AtomSet, session: &Session) -> AtomSet {
    atoms.iter().map(|a| a.apply(sub, session)).collect()
}
