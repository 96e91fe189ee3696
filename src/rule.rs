//! Rules, fragment validators and head-piece decomposition.

use indexmap::IndexSet;

use crate::atom::Atom;
use crate::formula::{ConjunctiveQuery, Formula, ValidationError};
use crate::id::VarId;
use crate::session::Session;
use crate::substitution::Substitution;

/// A rule `body -> head`.
///
/// Head variables absent from the body are implicitly existentially
/// quantified. A disjunctive head is a [`Formula::Disjunction`] whose
/// disjuncts are conjunctions of atoms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub body: Formula,
    pub head: Formula,
    pub label: Option<String>,
}

impl Rule {
    pub fn new(body: Formula, head: Formula) -> Self {
        Rule {
            body,
            head,
            label: None,
        }
    }

    pub fn labeled(body: Formula, head: Formula, label: impl Into<String>) -> Self {
        Rule {
            body,
            head,
            label: Some(label.into()),
        }
    }

    /// Check the free-variable contract: every head variable is either a
    /// body variable or an existential of the head.
    pub fn validate(&self, session: &Session) -> Result<(), ValidationError> {
        // With implicit existentials the contract is trivially satisfied
        // unless the head carries explicit quantifiers, so only explicitly
        // universally-quantified heads can fail.
        if let Formula::Universal(vars, _) = &self.head {
            let body_vars = self.body.free_variables(session);
            for &v in vars {
                if !body_vars.contains(&v) {
                    return Err(ValidationError::UnboundHeadVariable(
                        session.variable_name(v),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Variables shared between body and head.
    pub fn frontier(&self, session: &Session) -> IndexSet<VarId> {
        let body_vars = self.body.free_variables(session);
        self.head
            .free_variables(session)
            .into_iter()
            .filter(|v| body_vars.contains(v))
            .collect()
    }

    /// Head variables that do not occur in the body.
    pub fn existential_variables(&self, session: &Session) -> IndexSet<VarId> {
        let body_vars = self.body.free_variables(session);
        self.head
            .free_variables(session)
            .into_iter()
            .filter(|v| !body_vars.contains(v))
            .collect()
    }

    /// All variables of the rule.
    pub fn variables(&self, session: &Session) -> IndexSet<VarId> {
        let mut vars = self.body.free_variables(session);
        vars.extend(self.head.free_variables(session));
        vars
    }

    /// The head disjuncts (a single-element list for conjunctive heads).
    pub fn head_disjuncts(&self) -> Vec<&Formula> {
        match &self.head {
            Formula::Disjunction(xs) => xs.iter().collect(),
            other => vec![other],
        }
    }

    /// The atoms of one head disjunct.
    pub fn head_disjunct_atoms(&self, index: usize) -> Option<Vec<Atom>> {
        self.head_disjuncts()
            .get(index)
            .and_then(|d| d.as_atom_conjunction())
    }

    /// The conjunctive rule obtained by keeping a single head disjunct.
    pub fn extract_conjunctive(&self, index: usize) -> Option<Rule> {
        let disjuncts = self.head_disjuncts();
        let head = disjuncts.get(index)?;
        Some(Rule {
            body: self.body.clone(),
            head: (*head).clone(),
            label: self.label.clone(),
        })
    }

    /// The frontier of one head disjunct: its variables shared with the
    /// body, in variable-id order (a stable order for skolem keys).
    pub fn head_frontier(&self, index: usize, session: &Session) -> Vec<VarId> {
        let body_vars = self.body.free_variables(session);
        let mut frontier: Vec<VarId> = match self.head_disjuncts().get(index) {
            Some(d) => d
                .free_variables(session)
                .into_iter()
                .filter(|v| body_vars.contains(v))
                .collect(),
            None => Vec::new(),
        };
        frontier.sort_unstable();
        frontier
    }

    /// The positive body atoms (negated conjuncts excluded).
    pub fn positive_body(&self) -> Vec<Atom> {
        let mut atoms = Vec::new();
        for part in self.body.flatten_conjunction() {
            if let Formula::Atom(a) = part {
                atoms.push(a.clone());
            }
        }
        atoms
    }

    /// The atoms under a negation in the body.
    pub fn negative_body(&self) -> Vec<Atom> {
        let mut atoms = Vec::new();
        for part in self.body.flatten_conjunction() {
            if let Formula::Negation(inner) = part {
                for a in inner.atoms() {
                    atoms.push(a.clone());
                }
            }
        }
        atoms
    }

    /// The positive body as a conjunctive query with the frontier as
    /// answer signature.
    pub fn body_query(&self, session: &Session) -> ConjunctiveQuery {
        let frontier: Vec<VarId> = self.frontier(session).into_iter().collect();
        ConjunctiveQuery::new(self.positive_body(), frontier)
    }

    /// True iff the head is the absurd predicate (the rule is a
    /// constraint).
    pub fn is_constraint(&self, session: &Session) -> bool {
        match &self.head {
            Formula::Atom(a) => a.predicate == session.absurd_predicate(),
            _ => false,
        }
    }

    /// Rename every rule variable to a fresh one.
    pub fn refresh(&self, session: &Session) -> Rule {
        let renaming = crate::substitution::safe_renaming(&self.variables(session), session);
        self.apply(&renaming, session)
    }

    /// Image of the rule under a substitution.
    pub fn apply(&self, sub: &Substitution, session: &Session) -> Rule {
        Rule {
            body: self.body.apply(sub, session),
            head: self.head.apply(sub, session),
            label: self.label.clone(),
        }
    }

    /// Connected components of the head atoms of one disjunct, linked
    /// through shared existential variables.
    ///
    /// Atoms with no existential variable form singleton pieces. Used by
    /// by-piece skolemization and rule splitting.
    pub fn head_pieces(&self, index: usize, session: &Session) -> Vec<Vec<Atom>> {
        let atoms = match self.head_disjunct_atoms(index) {
            Some(atoms) => atoms,
            None => return Vec::new(),
        };
        let existentials = self.existential_variables(session);
        let mut pieces: Vec<(IndexSet<VarId>, Vec<Atom>)> = Vec::new();
        for atom in atoms {
            let atom_exist: IndexSet<VarId> = atom
                .variables(session)
                .into_iter()
                .filter(|v| existentials.contains(v))
                .collect();
            if atom_exist.is_empty() {
                pieces.push((IndexSet::new(), vec![atom]));
                continue;
            }
            // Merge every piece sharing an existential variable.
            let mut merged_vars = atom_exist;
            let mut merged_atoms = vec![atom];
            let mut remaining = Vec::new();
            for (vars, atoms) in pieces {
                if !vars.is_empty() && vars.iter().any(|v| merged_vars.contains(v)) {
                    merged_vars.extend(vars);
                    merged_atoms.extend(atoms);
                } else {
                    remaining.push((vars, atoms));
                }
            }
            remaining.push((merged_vars, merged_atoms));
            pieces = remaining;
        }
        pieces.into_iter().map(|(_, atoms)| atoms).collect()
    }

    pub fn display(&self, session: &Session) -> String {
        format!(
            "{} :- {}",
            self.head.display(session),
            self.body.display(session)
        )
    }
}

// ----------------------------------------------------------------------
// Fragment validators
// ----------------------------------------------------------------------

/// Plain conjunctive (datalog) rule: conjunctions of atoms on both sides,
/// no existential variable.
pub fn is_plain_conjunctive(rule: &Rule, session: &Session) -> bool {
    rule.body.as_atom_conjunction().is_some()
        && rule.head.as_atom_conjunction().is_some()
        && rule.existential_variables(session).is_empty()
}

/// Existential rule: conjunctions of atoms on both sides; head variables
/// may be existential.
pub fn is_existential(rule: &Rule, _session: &Session) -> bool {
    rule.body.as_atom_conjunction().is_some() && rule.head.as_atom_conjunction().is_some()
}

/// Disjunctive existential rule: atom-conjunction body, head a disjunction
/// of atom conjunctions.
pub fn is_disjunctive_existential(rule: &Rule, _session: &Session) -> bool {
    if rule.body.as_atom_conjunction().is_none() {
        return false;
    }
    rule.head_disjuncts()
        .iter()
        .all(|d| d.as_atom_conjunction().is_some())
}

/// Safe negation: the body is a conjunction of atoms and negated atoms, and
/// every variable of a negated atom occurs in a positive atom.
pub fn has_safe_negation(rule: &Rule, session: &Session) -> bool {
    let mut positive_vars: IndexSet<VarId> = IndexSet::new();
    for part in rule.body.flatten_conjunction() {
        match part {
            Formula::Atom(a) => {
                positive_vars.extend(a.variables(session));
            }
            Formula::Negation(inner) => {
                if inner.as_atom_conjunction().is_none() {
                    return false;
                }
            }
            _ => return false,
        }
    }
    for atom in rule.negative_body() {
        for v in atom.variables(session) {
            if !positive_vars.contains(&v) {
                return false;
            }
        }
    }
    true
}
