//! Existential-variable renamers.
//!
//! Before a trigger fires, the existential variables of the rule head are
//! renamed into witnesses. The renamer decides how witnesses are keyed,
//! which in turn decides when two triggers share a witness:
//!
//! - fresh: brand-new labeled nulls per trigger (no sharing);
//! - body skolem: keyed by the whole body substitution;
//! - frontier skolem: keyed by the frontier restriction;
//! - frontier-by-piece skolem: keyed per connected head piece, by the
//!   piece's frontier restriction.
//!
//! Each keyed family comes in a pseudo variant (witnesses are fresh
//! labeled nulls remembered per key) and a true variant (witnesses are
//! skolem function terms over the frontier images).

use indexmap::IndexMap;

use crate::id::VarId;
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// Extends a trigger substitution with bindings for the existential head
/// variables.
///
/// Renamers are `Send` so the multi-thread applier can share one behind a
/// mutex.
pub trait TriggerRenamer: Send {
    fn rename(
        &mut self,
        rule_index: usize,
        rule: &Rule,
        substitution: &Substitution,
        session: &Session,
    ) -> Substitution;
}

/// Witness naming for the keyed skolem families.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WitnessKind {
    /// Fresh labeled nulls, remembered per key.
    Pseudo,
    /// Skolem function terms over the sorted frontier images.
    True,
}

/// Brand-new witnesses for every trigger. Loses comparability between
/// triggers: the chase may not terminate where a keyed renamer would.
#[derive(Default)]
pub struct FreshRenamer;

impl TriggerRenamer for FreshRenamer {
    fn rename(
        &mut self,
        _rule_index: usize,
        rule: &Rule,
        substitution: &Substitution,
        session: &Session,
    ) -> Substitution {
        let mut renamed = substitution.clone();
        for v in rule.existential_variables(session) {
            renamed.bind(v, session.fresh_blank(&session.variable_name(v)));
        }
        renamed
    }
}

type WitnessKey = (usize, Vec<(VarId, Term)>);

fn skolem_term(
    rule: &Rule,
    rule_index: usize,
    scope: &str,
    counter: u64,
    frontier_images: Vec<Term>,
    session: &Session,
) -> Term {
    let label = rule
        .label
        .clone()
        .unwrap_or_else(|| format!("r{rule_index}"));
    session.logical_function_term(&format!("sk_{scope}_{label}_{counter}"), frontier_images)
}

/// Witnesses keyed by the body substitution.
pub struct BodySkolemRenamer {
    kind: WitnessKind,
    witnesses: IndexMap<WitnessKey, IndexMap<VarId, Term>>,
    counter: u64,
}

impl BodySkolemRenamer {
    pub fn new(kind: WitnessKind) -> Self {
        BodySkolemRenamer {
            kind,
            witnesses: IndexMap::new(),
            counter: 0,
        }
    }
}

impl TriggerRenamer for BodySkolemRenamer {
    fn rename(
        &mut self,
        rule_index: usize,
        rule: &Rule,
        substitution: &Substitution,
        session: &Session,
    ) -> Substitution {
        let body_vars = rule.body.free_variables(session);
        let key = (
            rule_index,
            substitution.restrict_to(&body_vars).canonical_key(),
        );
        let kind = self.kind;
        let counter = &mut self.counter;
        let by_key = self.witnesses.entry(key).or_default();
        let mut renamed = substitution.clone();
        for v in rule.existential_variables(session) {
            let witness = *by_key.entry(v).or_insert_with(|| match kind {
                WitnessKind::Pseudo => session.fresh_blank(&session.variable_name(v)),
                WitnessKind::True => {
                    *counter += 1;
                    let mut frontier: Vec<VarId> =
                        rule.frontier(session).into_iter().collect();
                    frontier.sort_unstable();
                    let images = frontier
                        .iter()
                        .map(|&f| substitution.apply_term(Term::Variable(f), session))
                        .collect();
                    skolem_term(rule, rule_index, "body", *counter, images, session)
                }
            });
            renamed.bind(v, witness);
        }
        renamed
    }
}

/// Witnesses keyed by the frontier restriction of the substitution.
pub struct FrontierSkolemRenamer {
    kind: WitnessKind,
    witnesses: IndexMap<WitnessKey, IndexMap<VarId, Term>>,
    counter: u64,
}

impl FrontierSkolemRenamer {
    pub fn new(kind: WitnessKind) -> Self {
        FrontierSkolemRenamer {
            kind,
            witnesses: IndexMap::new(),
            counter: 0,
        }
    }
}

impl TriggerRenamer for FrontierSkolemRenamer {
    fn rename(
        &mut self,
        rule_index: usize,
        rule: &Rule,
        substitution: &Substitution,
        session: &Session,
    ) -> Substitution {
        let frontier = rule.frontier(session);
        let key = (
            rule_index,
            substitution.restrict_to(&frontier).canonical_key(),
        );
        let kind = self.kind;
        let counter = &mut self.counter;
        let by_key = self.witnesses.entry(key).or_default();
        let mut renamed = substitution.clone();
        for v in rule.existential_variables(session) {
            let witness = *by_key.entry(v).or_insert_with(|| match kind {
                WitnessKind::Pseudo => session.fresh_blank(&session.variable_name(v)),
                WitnessKind::True => {
                    *counter += 1;
                    let mut sorted: Vec<VarId> = frontier.iter().copied().collect();
                    sorted.sort_unstable();
                    let images = sorted
                        .iter()
                        .map(|&f| substitution.apply_term(Term::Variable(f), session))
                        .collect();
                    skolem_term(rule, rule_index, "frontier", *counter, images, session)
                }
            });
            renamed.bind(v, witness);
        }
        renamed
    }
}

/// Witnesses keyed per connected head piece: two pieces share witnesses
/// only when their own frontier bindings agree.
pub struct FrontierByPieceSkolemRenamer {
    kind: WitnessKind,
    witnesses: IndexMap<(usize, usize, Vec<(VarId, Term)>), IndexMap<VarId, Term>>,
    counter: u64,
}

impl FrontierByPieceSkolemRenamer {
    pub fn new(kind: WitnessKind) -> Self {
        FrontierByPieceSkolemRenamer {
            kind,
            witnesses: IndexMap::new(),
            counter: 0,
        }
    }
}

impl TriggerRenamer for FrontierByPieceSkolemRenamer {
    fn rename(
        &mut self,
        rule_index: usize,
        rule: &Rule,
        substitution: &Substitution,
        session: &Session,
    ) -> Substitution {
        let existentials = rule.existential_variables(session);
        let frontier = rule.frontier(session);
        let mut renamed = substitution.clone();

        let mut piece_number = 0usize;
        for disjunct in 0..rule.head_disjuncts().len() {
            for piece in rule.head_pieces(disjunct, session) {
                piece_number += 1;
                let mut piece_vars = indexmap::IndexSet::new();
                for atom in &piece {
                    piece_vars.extend(atom.variables(session));
                }
                let piece_existentials: Vec<VarId> = piece_vars
                    .iter()
                    .copied()
                    .filter(|v| existentials.contains(v))
                    .collect();
                if piece_existentials.is_empty() {
                    continue;
                }
                let mut piece_frontier: Vec<VarId> = piece_vars
                    .iter()
                    .copied()
                    .filter(|v| frontier.contains(v))
                    .collect();
                piece_frontier.sort_unstable();
                let frontier_set: indexmap::IndexSet<VarId> =
                    piece_frontier.iter().copied().collect();
                let key = (
                    rule_index,
                    piece_number,
                    substitution.restrict_to(&frontier_set).canonical_key(),
                );
                let kind = self.kind;
                let counter = &mut self.counter;
                let by_key = self.witnesses.entry(key).or_default();
                for v in piece_existentials {
                    let witness = *by_key.entry(v).or_insert_with(|| match kind {
                        WitnessKind::Pseudo => {
                            session.fresh_blank(&session.variable_name(v))
                        }
                        WitnessKind::True => {
                            *counter += 1;
                            let images = piece_frontier
                                .iter()
                                .map(|&f| {
                                    substitution.apply_term(Term::Variable(f), session)
                                })
                                .collect();
                            skolem_term(rule, rule_index, "piece", *counter, images, session)
                        }
                    });
                    renamed.bind(v, witness);
                }
            }
        }
        renamed
    }
}
