//! Chase treatments: hooks around the step loop.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use crate::atom::Atom;
use crate::chase::applier::StepResult;
use crate::chase::ChasableData;
use crate::data::WritableData;
use crate::data::fact_base::InMemoryFactBase;
use crate::homomorphism::homomorphisms;
use crate::id::PredId;
use crate::kb::RuleBase;
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// A hook applied at one of the four treatment points (global/step,
/// pre/end).
pub trait Treatment {
    fn apply(
        &mut self,
        data: &mut ChasableData<'_>,
        rules: &mut RuleBase,
        last_step: &StepResult,
        session: &Session,
    );
}

/// Splits conjunctive heads into their existential pieces, one rule per
/// piece. Run as a global pretreatment.
#[derive(Default)]
pub struct RuleSplitTreatment;

impl Treatment for RuleSplitTreatment {
    fn apply(
        &mut self,
        _data: &mut ChasableData<'_>,
        rules: &mut RuleBase,
        _last_step: &StepResult,
        session: &Session,
    ) {
        let mut split = Vec::new();
        for rule in rules.iter() {
            if rule.head_disjuncts().len() != 1 {
                split.push(rule.clone());
                continue;
            }
            let pieces = rule.head_pieces(0, session);
            if pieces.len() <= 1 {
                split.push(rule.clone());
                continue;
            }
            for (index, piece) in pieces.into_iter().enumerate() {
                let head = crate::formula::Formula::conjunction_of(piece);
                let label = rule
                    .label
                    .as_ref()
                    .map(|l| format!("{l}.{index}"));
                split.push(Rule {
                    body: rule.body.clone(),
                    head,
                    label,
                });
            }
        }
        let label = rules.label.clone();
        *rules = RuleBase::new(split);
        rules.label = label;
    }
}

/// Collects the facts created at each step into a shared sink.
pub struct AddCreatedFactsTreatment {
    sink: Arc<Mutex<Vec<Atom>>>,
}

impl AddCreatedFactsTreatment {
    pub fn new(sink: Arc<Mutex<Vec<Atom>>>) -> Self {
        AddCreatedFactsTreatment { sink }
    }
}

impl Treatment for AddCreatedFactsTreatment {
    fn apply(
        &mut self,
        _data: &mut ChasableData<'_>,
        _rules: &mut RuleBase,
        last_step: &StepResult,
        _session: &Session,
    ) {
        self.sink.lock().extend(last_step.created.iter().cloned());
    }
}

/// Keeps only the given predicates in the final fact base. Run as a
/// global end treatment.
pub struct PredicateFilterTreatment {
    keep: IndexSet<PredId>,
}

impl PredicateFilterTreatment {
    pub fn new(keep: impl IntoIterator<Item = PredId>) -> Self {
        PredicateFilterTreatment {
            keep: keep.into_iter().collect(),
        }
    }
}

impl Treatment for PredicateFilterTreatment {
    fn apply(
        &mut self,
        data: &mut ChasableData<'_>,
        _rules: &mut RuleBase,
        _last_step: &StepResult,
        _session: &Session,
    ) {
        let dropped: Vec<Atom> = data
            .facts
            .iter()
            .filter(|a| !self.keep.contains(&a.predicate))
            .cloned()
            .collect();
        for atom in dropped {
            data.facts.remove(&atom);
        }
    }
}

/// Logs step statistics.
#[derive(Default)]
pub struct DebugTreatment;

impl Treatment for DebugTreatment {
    fn apply(
        &mut self,
        data: &mut ChasableData<'_>,
        rules: &mut RuleBase,
        last_step: &StepResult,
        _session: &Session,
    ) {
        log::debug!(
            "treatment snapshot: {} facts, {} rules, {} created last step",
            data.facts.len(),
            rules.len(),
            last_step.created.len()
        );
    }
}

/// Global core computation: folds redundant labeled-null pieces into the
/// rest of the fact base. Run as a global end treatment.
#[derive(Default)]
pub struct ComputeCoreTreatment;

impl Treatment for ComputeCoreTreatment {
    fn apply(
        &mut self,
        data: &mut ChasableData<'_>,
        _rules: &mut RuleBase,
        _last_step: &StepResult,
        session: &Session,
    ) {
        fold_null_pieces(data.facts, None, session);
    }
}

/// Core computation restricted to the pieces touched by the last step.
#[derive(Default)]
pub struct LocalCoreTreatment;

impl Treatment for LocalCoreTreatment {
    fn apply(
        &mut self,
        data: &mut ChasableData<'_>,
        _rules: &mut RuleBase,
        last_step: &StepResult,
        session: &Session,
    ) {
        if !last_step.created.is_empty() {
            fold_null_pieces(data.facts, Some(&last_step.created), session);
        }
    }
}

/// The connected components of null-carrying atoms, linked through shared
/// labeled nulls.
fn null_pieces(facts: &InMemoryFactBase, session: &Session) -> Vec<Vec<Atom>> {
    let mut piece_of_null: IndexMap<Term, usize> = IndexMap::new();
    let mut pieces: Vec<Vec<Atom>> = Vec::new();

    for atom in facts.iter() {
        let nulls: Vec<Term> = atom
            .args
            .iter()
            .copied()
            .filter(|&t| session.is_blank(t))
            .collect();
        if nulls.is_empty() {
            continue;
        }
        // Merge the pieces this atom's nulls already belong to.
        let mut target: Option<usize> = None;
        for &null in &nulls {
            if let Some(&p) = piece_of_null.get(&null) {
                match target {
                    None => target = Some(p),
                    Some(t) if t != p => {
                        let moved = std::mem::take(&mut pieces[p]);
                        for a in &moved {
                            for &arg in &a.args {
                                if session.is_blank(arg) {
                                    piece_of_null.insert(arg, t);
                                }
                            }
                        }
                        pieces[t].extend(moved);
                    }
                    _ => {}
                }
            }
        }
        let target = target.unwrap_or_else(|| {
            pieces.push(Vec::new());
            pieces.len() - 1
        });
        for &null in &nulls {
            piece_of_null.insert(null, target);
        }
        pieces[target].push(atom.clone());
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

/// Fold pieces: when a piece has a homomorphic image elsewhere in the
/// facts, the atoms outside that image are redundant and get retracted.
fn fold_null_pieces(facts: &mut InMemoryFactBase, touched: Option<&[Atom]>, session: &Session) {
    loop {
        let mut changed = false;
        for piece in null_pieces(facts, session) {
            if let Some(touched) = touched {
                if !piece.iter().any(|a| touched.contains(a)) {
                    continue;
                }
            }
            // Generalize the piece's nulls into variables, consistently.
            let mut null_vars: IndexMap<Term, Term> = IndexMap::new();
            let pattern: Vec<Atom> = piece
                .iter()
                .map(|atom| {
                    let args: Vec<Term> = atom
                        .args
                        .iter()
                        .map(|&arg| {
                            if session.is_blank(arg) {
                                *null_vars
                                    .entry(arg)
                                    .or_insert_with(|| session.fresh_variable("null"))
                            } else {
                                arg
                            }
                        })
                        .collect();
                    Atom::new(atom.predicate, args)
                })
                .collect();

            let piece_set: IndexSet<Atom> = piece.iter().cloned().collect();
            let fold = homomorphisms(&pattern, facts, Substitution::new(), session)
                .map(|sub| {
                    pattern
                        .iter()
                        .map(|a| a.apply(&sub, session))
                        .collect::<IndexSet<Atom>>()
                })
                .find(|image| piece_set.iter().any(|a| !image.contains(a)));

            if let Some(image) = fold {
                for atom in piece_set.difference(&image) {
                    facts.remove(atom);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}
