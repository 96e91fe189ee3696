//! Piece unifiers.
//!
//! A piece unifier matches a subset of a conjunctive query against a subset
//! of a rule head so that the existential variables of the rule stay
//! isolated: an existential variable may not be identified with a ground
//! term, a frontier variable, an answer variable, or leak into the part of
//! the query left un-unified. The enumeration starts from single atom-atom
//! matchings and aggregates exactly the matchings forced by sticky
//! variables, which yields the most general unifiers.

use indexmap::IndexSet;

use crate::atom::Atom;
use crate::formula::ConjunctiveQuery;
use crate::id::VarId;
use crate::partition::TermPartition;
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// A most general piece unifier of a query with a conjunctive-head rule.
#[derive(Clone, Debug)]
pub struct PieceUnifier {
    /// The rule, with a conjunctive head.
    pub rule: Rule,
    /// The target query.
    pub query: ConjunctiveQuery,
    /// The unified subset of the query atoms.
    pub unified_query_part: Vec<Atom>,
    /// The matched head atom for each unified query atom.
    pub matched_head_atoms: Vec<Atom>,
    /// The joint term partition over the matched atoms.
    pub partition: TermPartition,
}

impl PieceUnifier {
    /// The query atoms left un-unified.
    pub fn not_unified_part(&self) -> Vec<Atom> {
        self.query
            .atoms()
            .iter()
            .filter(|a| !self.unified_query_part.contains(a))
            .cloned()
            .collect()
    }

    /// Query variables shared between the unified and un-unified parts.
    pub fn separating_variables(&self, session: &Session) -> IndexSet<VarId> {
        let unified = part_variables(&self.unified_query_part, session);
        let rest = part_variables(&self.not_unified_part(), session);
        unified.intersection(&rest).copied().collect()
    }

    /// Query variables identified with an existential variable of the rule.
    pub fn sticky_variables(&self, session: &Session) -> IndexSet<VarId> {
        sticky_variables(
            &self.partition,
            &self.unified_query_part,
            &self.rule.existential_variables(session),
            session,
        )
    }

    /// The substitution induced by the partition, with the query as
    /// context (query variables win representative elections over rule
    /// variables).
    pub fn associated_substitution(&self, session: &Session) -> Option<Substitution> {
        let answer_vars: IndexSet<VarId> =
            self.query.answer_variables.iter().copied().collect();
        let context_vars = self.query.variables(session);
        self.partition
            .associated_substitution(&answer_vars, &context_vars, session)
    }

    /// Whether the two unifiers can participate in one disjunctive unifier:
    /// disjoint unified parts over the same query, and an admissible joined
    /// partition.
    pub fn is_compatible_with(&self, other: &PieceUnifier, session: &Session) -> bool {
        if self.query == other.query
            && self
                .unified_query_part
                .iter()
                .any(|a| other.unified_query_part.contains(a))
        {
            return false;
        }
        let mut joined = self.partition.clone();
        joined.join(&other.partition);
        joined.is_admissible(session)
    }

    /// A canonical key for deduplication.
    fn canonical_key(&self, _session: &Session) -> (Vec<Atom>, Vec<Vec<Term>>) {
        let mut atoms = self.unified_query_part.clone();
        atoms.sort();
        let mut classes: Vec<Vec<Term>> = self
            .partition
            .classes()
            .into_iter()
            .filter(|c| c.len() > 1)
            .map(|mut c| {
                c.sort();
                c
            })
            .collect();
        classes.sort();
        (atoms, classes)
    }
}

fn part_variables(atoms: &[Atom], session: &Session) -> IndexSet<VarId> {
    let mut vars = IndexSet::new();
    for atom in atoms {
        vars.extend(atom.variables(session));
    }
    vars
}

fn sticky_variables(
    partition: &TermPartition,
    unified: &[Atom],
    existentials: &IndexSet<VarId>,
    session: &Session,
) -> IndexSet<VarId> {
    let unified_vars = part_variables(unified, session);
    let mut sticky = IndexSet::new();
    for class in partition.classes() {
        let has_existential = class.iter().any(|t| match t {
            Term::Variable(v) => existentials.contains(v),
            _ => false,
        });
        if !has_existential {
            continue;
        }
        for term in class {
            if let Term::Variable(v) = term {
                if unified_vars.contains(&v) && !existentials.contains(&v) {
                    sticky.insert(v);
                }
            }
        }
    }
    sticky
}

/// One atom-to-atom pre-unifier.
#[derive(Clone, Debug)]
struct AtomicUnifier {
    query_index: usize,
    head_atom: Atom,
    partition: TermPartition,
}

/// Compute the most general piece unifiers of a conjunctive query with a
/// conjunctive-head rule.
///
/// The caller is responsible for the rule and query having disjoint
/// variables (the rewriting loop renames the query; the dependency graph
/// refreshes the rule).
pub fn most_general_piece_unifiers(
    query: &ConjunctiveQuery,
    rule: &Rule,
    session: &Session,
) -> Vec<PieceUnifier> {
    let head_atoms = match rule.head.as_atom_conjunction() {
        Some(atoms) => atoms,
        None => return Vec::new(),
    };
    let existentials = rule.existential_variables(session);
    let frontier = rule.frontier(session);
    let answer_vars: IndexSet<VarId> = query.answer_variables.iter().copied().collect();

    // All atom-to-atom candidates.
    let mut atomic: Vec<AtomicUnifier> = Vec::new();
    for (query_index, query_atom) in query.atoms().iter().enumerate() {
        for head_atom in &head_atoms {
            if head_atom.predicate != query_atom.predicate {
                continue;
            }
            let mut partition = TermPartition::new();
            for (&qt, &ht) in query_atom.args.iter().zip(head_atom.args.iter()) {
                partition.union(qt, ht);
            }
            if partition.is_admissible(session)
                && partition.is_valid(&existentials, &frontier, &answer_vars, session)
            {
                atomic.push(AtomicUnifier {
                    query_index,
                    head_atom: head_atom.clone(),
                    partition,
                });
            }
        }
    }

    let mut results: Vec<PieceUnifier> = Vec::new();
    let mut seen: IndexSet<(Vec<Atom>, Vec<Vec<Term>>)> = IndexSet::new();

    // Each atomic unifier seeds a closure: matchings are added only when a
    // sticky variable would otherwise separate, so the result is most
    // general.
    for seed in 0..atomic.len() {
        close(
            query,
            rule,
            &atomic,
            vec![seed],
            &existentials,
            &frontier,
            &answer_vars,
            session,
            &mut results,
            &mut seen,
        );
    }
    results
}

#[allow(clippy::too_many_arguments)]
fn close(
    query: &ConjunctiveQuery,
    rule: &Rule,
    atomic: &[AtomicUnifier],
    chosen: Vec<usize>,
    existentials: &IndexSet<VarId>,
    frontier: &IndexSet<VarId>,
    answer_vars: &IndexSet<VarId>,
    session: &Session,
    results: &mut Vec<PieceUnifier>,
    seen: &mut IndexSet<(Vec<Atom>, Vec<Vec<Term>>)>,
) {
    // Joint partition of the chosen matchings.
    let mut partition = TermPartition::new();
    let mut unified_indices: IndexSet<usize> = IndexSet::new();
    for &c in &chosen {
        partition.join(&atomic[c].partition);
        unified_indices.insert(atomic[c].query_index);
    }
    if !partition.is_admissible(session)
        || !partition.is_valid(existentials, frontier, answer_vars, session)
    {
        return;
    }

    let unified: Vec<Atom> = unified_indices
        .iter()
        .map(|&i| query.atoms()[i].clone())
        .collect();
    let sticky = sticky_variables(&partition, &unified, existentials, session);

    // An un-unified atom holding a sticky variable forces aggregation.
    let offending = query.atoms().iter().enumerate().find(|(i, atom)| {
        !unified_indices.contains(i)
            && atom
                .variables(session)
                .iter()
                .any(|v| sticky.contains(v))
    });

    match offending {
        None => {
            let unifier = PieceUnifier {
                rule: rule.clone(),
                query: query.clone(),
                unified_query_part: unified,
                matched_head_atoms: chosen
                    .iter()
                    .map(|&c| atomic[c].head_atom.clone())
                    .collect(),
                partition,
            };
            if seen.insert(unifier.canonical_key(session)) {
                results.push(unifier);
            }
        }
        Some((index, _)) => {
            let candidates: Vec<usize> = atomic
                .iter()
                .enumerate()
                .filter(|(_, a)| a.query_index == index)
                .map(|(i, _)| i)
                .collect();
            // No way to absorb the offending atom: the candidate dies.
            for candidate in candidates {
                let mut extended = chosen.clone();
                extended.push(candidate);
                close(
                    query,
                    rule,
                    atomic,
                    extended,
                    existentials,
                    frontier,
                    answer_vars,
                    session,
                    results,
                    seen,
                );
            }
        }
    }
}

/// Whether some piece unifier exists (the dependency-graph probe).
pub fn piece_unifier_exists(query: &ConjunctiveQuery, rule: &Rule, session: &Session) -> bool {
    !most_general_piece_unifiers(query, rule, session).is_empty()
}
