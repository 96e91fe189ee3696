//! Breadth-first UCQ rewriting.
//!
//! Expands a union of conjunctive queries under a rule set: each round
//! applies the rewriting operator to the queries produced by the previous
//! round, then cleans redundancies so the union stays a cover (no
//! disjunct subsumes another). Enumeration is lazy inside a round;
//! rounds are ordered breadth-first.

use crate::formula::{ConjunctiveQuery, UnionQuery};
use crate::query::containment::subsumes;
use crate::rewriting::disjunctive::DisjunctivePieceUnifierAlgorithm;
use crate::rewriting::unifier::most_general_piece_unifiers;
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::{safe_renaming, Substitution};

/// Remove every disjunct subsumed by another one. The first of two
/// equivalent disjuncts wins.
pub fn compute_cover(ucq: &UnionQuery, session: &Session) -> UnionQuery {
    let cqs = ucq.conjunctive_queries();
    let mut kept: Vec<bool> = vec![true; cqs.len()];
    for i in 0..cqs.len() {
        if !kept[i] {
            continue;
        }
        for j in 0..cqs.len() {
            if i == j || !kept[j] {
                continue;
            }
            if subsumes(&cqs[j], &cqs[i], session) {
                // Equivalent disjuncts: keep the earlier one.
                if subsumes(&cqs[i], &cqs[j], session) && i < j {
                    continue;
                }
                kept[i] = false;
                break;
            }
        }
    }
    UnionQuery::new(
        cqs.iter()
            .zip(kept)
            .filter(|(_, keep)| *keep)
            .map(|(cq, _)| cq.clone()),
        ucq.answer_variables.clone(),
    )
}

/// Drop from `these` every disjunct subsumed by a disjunct of `others`.
pub fn remove_more_specific_than(
    these: &UnionQuery,
    others: &UnionQuery,
    session: &Session,
) -> UnionQuery {
    UnionQuery::new(
        these
            .iter()
            .filter(|cq| !others.iter().any(|other| subsumes(other, cq, session)))
            .cloned(),
        these.answer_variables.clone(),
    )
}

/// One rewriting round: every piece unifier of a new query with a rule
/// produces a rewritten query.
fn rewrite_round(
    new_cqs: &UnionQuery,
    rules: &[Rule],
    algorithm: &mut DisjunctivePieceUnifierAlgorithm,
    session: &Session,
) -> UnionQuery {
    let answer_variables = new_cqs.answer_variables.clone();
    let mut produced = UnionQuery::empty(answer_variables.clone());

    for (rule_index, rule) in rules.iter().enumerate() {
        if rule.head_disjuncts().len() == 1 {
            // Conjunctive head: classical piece-unifier rewriting.
            let body_atoms = match rule.body.as_atom_conjunction() {
                Some(atoms) => atoms,
                None => continue,
            };
            for cq in new_cqs.iter() {
                let renaming = safe_renaming(&cq.existential_variables(session), session);
                let renamed = cq.apply(&renaming, session);
                for unifier in most_general_piece_unifiers(&renamed, rule, session) {
                    let substitution = match unifier.associated_substitution(session) {
                        Some(sub) => sub,
                        None => continue,
                    };
                    let mut atoms = body_atoms.clone();
                    atoms.extend(unifier.not_unified_part());
                    let rewritten =
                        ConjunctiveQuery::new(atoms, answer_variables.clone())
                            .apply(&substitution, session);
                    produced.insert(rewritten);
                }
            }
        } else {
            // Disjunctive head: combine per-disjunct unifiers.
            for unifier in algorithm.compute(new_cqs, rule_index, rule, session) {
                let substitution =
                    match unifier.associated_substitution(&answer_variables, session) {
                        Some(sub) => sub,
                        None => continue,
                    };
                let mut atoms = match unifier.rule.body.as_atom_conjunction() {
                    Some(atoms) => atoms,
                    None => continue,
                };
                atoms.extend(unifier.remainders());
                let rewritten = ConjunctiveQuery::new(atoms, answer_variables.clone())
                    .apply(&substitution, session);
                produced.insert(rewritten);
            }
        }
    }
    produced
}

/// Breadth-first UCQ rewriting. `step_limit` of 0 means unlimited.
///
/// The result is a cover: no disjunct subsumes another (property checked
/// by the redundancy cleaner each round).
pub fn rewrite(
    ucq: &UnionQuery,
    rules: &[Rule],
    step_limit: usize,
    session: &Session,
) -> UnionQuery {
    // Rename query variables apart from every rule variable.
    let mut rule_vars = indexmap::IndexSet::new();
    for rule in rules {
        rule_vars.extend(rule.variables(session));
    }
    let clashing: indexmap::IndexSet<_> = ucq
        .variables(session)
        .into_iter()
        .filter(|v| rule_vars.contains(v))
        .collect();
    let renaming = if clashing.is_empty() {
        Substitution::new()
    } else {
        safe_renaming(&clashing, session)
    };
    let renamed = UnionQuery::new(
        ucq.iter().map(|cq| cq.apply(&renaming, session)),
        ucq.answer_variables
            .iter()
            .map(|&v| match renaming.get(v) {
                Some(crate::term::Term::Variable(w)) => w,
                _ => v,
            })
            .collect(),
    );

    let mut algorithm = DisjunctivePieceUnifierAlgorithm::new();
    let mut new_cqs = compute_cover(&renamed, session);
    let mut result = new_cqs.clone();
    let cancel = session.cancel_flag();

    let mut step = 0usize;
    while !new_cqs.is_empty() && (step_limit == 0 || step < step_limit) {
        if cancel.is_cancelled() {
            break;
        }
        step += 1;
        algorithm.cleanup(&result);
        let produced = rewrite_round(&new_cqs, rules, &mut algorithm, session);
        let produced = compute_cover(&produced, session);
        let produced = remove_more_specific_than(&produced, &result, session);
        result = remove_more_specific_than(&result, &produced, session);
        result.extend(produced.clone());
        new_cqs = produced;
        log::debug!("rewriting step {step}: union holds {} queries", result.len());
    }
    result
}
