//! Substitutions: finite maps from variables to terms.

use indexmap::{IndexMap, IndexSet};

use crate::id::VarId;
use crate::session::Session;
use crate::term::Term;

/// A substitution. Identity bindings (`x -> x`) are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: IndexMap<VarId, Term>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: impl IntoIterator<Item = (VarId, Term)>) -> Self {
        let mut sub = Substitution::new();
        for (var, term) in bindings {
            sub.bind(var, term);
        }
        sub
    }

    /// Bind a variable, dropping identity mappings.
    pub fn bind(&mut self, var: VarId, term: Term) {
        if term == Term::Variable(var) {
            self.bindings.shift_remove(&var);
        } else {
            self.bindings.insert(var, term);
        }
    }

    pub fn get(&self, var: VarId) -> Option<Term> {
        self.bindings.get(&var).copied()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.bindings.contains_key(&var)
    }

    pub fn remove(&mut self, var: VarId) -> Option<Term> {
        self.bindings.shift_remove(&var)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn domain(&self) -> impl Iterator<Item = VarId> + '_ {
        self.bindings.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, Term)> + '_ {
        self.bindings.iter().map(|(&v, &t)| (v, t))
    }

    /// Apply to a term. Function terms are rebuilt (and re-interned) with
    /// substituted arguments.
    pub fn apply_term(&self, term: Term, session: &Session) -> Term {
        match term {
            Term::Variable(v) => self.get(v).unwrap_or(term),
            Term::Constant(_) | Term::Literal(_) => term,
            Term::Function(id) => {
                let data = session.fn_term(id);
                if data.ground {
                    return term;
                }
                let args: Vec<Term> = data
                    .args
                    .iter()
                    .map(|&a| self.apply_term(a, session))
                    .collect();
                session.function_term(data.symbol, args, data.evaluable)
            }
        }
    }

    /// Compose with another substitution; `other` acts first:
    /// `(self . other)(x) = self(other(x))`.
    pub fn compose(&self, other: &Substitution, session: &Session) -> Substitution {
        let mut result = Substitution::new();
        for (var, term) in other.iter() {
            result.bind(var, self.apply_term(term, session));
        }
        for (var, term) in self.iter() {
            if !result.contains(var) && other.get(var).is_none() {
                result.bind(var, term);
            }
        }
        result
    }

    /// Resolve variable-to-variable chains: `{x -> y, y -> a}` becomes
    /// `{x -> a, y -> a}`. Cycles resolve to the last variable reached.
    pub fn normalize(&self) -> Substitution {
        let mut result = Substitution::new();
        for (var, _) in self.iter() {
            let mut current = self.get(var).expect("domain variable");
            let mut seen: IndexSet<VarId> = IndexSet::new();
            seen.insert(var);
            while let Term::Variable(v) = current {
                if !seen.insert(v) {
                    break;
                }
                match self.get(v) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            result.bind(var, current);
        }
        result
    }

    /// Restriction to a set of variables.
    pub fn restrict_to(&self, vars: &IndexSet<VarId>) -> Substitution {
        let mut result = Substitution::new();
        for (var, term) in self.iter() {
            if vars.contains(&var) {
                result.bind(var, term);
            }
        }
        result
    }

    /// Merge two substitutions; `other` wins on conflicts.
    pub fn aggregate(&self, other: &Substitution) -> Substitution {
        let mut result = self.clone();
        for (var, term) in other.iter() {
            result.bind(var, term);
        }
        result
    }

    /// A canonical key for trigger dedup: the bindings sorted by variable.
    pub fn canonical_key(&self) -> Vec<(VarId, Term)> {
        let mut key: Vec<(VarId, Term)> = self.iter().collect();
        key.sort_unstable();
        key
    }

    /// Render through the session, for diagnostics.
    pub fn display(&self, session: &Session) -> String {
        let entries: Vec<String> = self
            .iter()
            .map(|(v, t)| {
                format!(
                    "{} -> {}",
                    session.variable_name(v),
                    session.display_term(t)
                )
            })
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

/// A renaming of `vars` to fresh variables. Applying the result and then any
/// other substitution is order-independent modulo the fresh names.
pub fn safe_renaming(vars: &IndexSet<VarId>, session: &Session) -> Substitution {
    let mut sub = Substitution::new();
    for &var in vars {
        let fresh = session.fresh_variable(&session.variable_name(var));
        sub.bind(var, fresh);
    }
    sub
}
