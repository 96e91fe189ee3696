//! Homomorphism search: backtracking conjunctive-query evaluation.
//!
//! Enumerates every substitution embedding a list of atoms into a data
//! source. The search is lazy (consumer pull drives all work) and polls the
//! session cancel flag at atom boundaries.
//!
//! Two schedulers choose the next atom to match:
//! - static: atoms are ordered once, maximizing shared-variable overlap
//!   with already-matched atoms;
//! - dynamic (default): at each step the unmatched atom with the smallest
//!   estimated result set among the evaluable ones, ties broken by fewer
//!   free variables, then insertion order.

use indexmap::IndexSet;

use crate::atom::Atom;
use crate::data::{BasicQuery, ReadableData};
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// Atom-ordering strategy for the backtracking search.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Scheduler {
    Static,
    #[default]
    Dynamic,
}

/// All homomorphisms from `atoms` into `data` extending `initial`, with the
/// dynamic scheduler.
pub fn homomorphisms<'a>(
    atoms: &'a [Atom],
    data: &'a dyn ReadableData,
    initial: Substitution,
    session: &'a Session,
) -> Box<dyn Iterator<Item = Substitution> + 'a> {
    homomorphisms_with(atoms, data, initial, Scheduler::Dynamic, session)
}

/// All homomorphisms, with an explicit scheduler.
pub fn homomorphisms_with<'a>(
    atoms: &'a [Atom],
    data: &'a dyn ReadableData,
    initial: Substitution,
    scheduler: Scheduler,
    session: &'a Session,
) -> Box<dyn Iterator<Item = Substitution> + 'a> {
    let order: Vec<usize> = match scheduler {
        Scheduler::Dynamic => (0..atoms.len()).collect(),
        Scheduler::Static => static_order(atoms, session),
    };
    backtrack(atoms, data, initial, order, scheduler, session)
}

/// Whether at least one homomorphism exists.
pub fn exist_homomorphism(
    atoms: &[Atom],
    data: &dyn ReadableData,
    initial: Substitution,
    session: &Session,
) -> bool {
    homomorphisms(atoms, data, initial, session).next().is_some()
}

fn backtrack<'a>(
    atoms: &'a [Atom],
    data: &'a dyn ReadableData,
    sub: Substitution,
    remaining: Vec<usize>,
    scheduler: Scheduler,
    session: &'a Session,
) -> Box<dyn Iterator<Item = Substitution> + 'a> {
    if session.cancel_flag().is_cancelled() {
        return Box::new(std::iter::empty());
    }
    if remaining.is_empty() {
        return Box::new(std::iter::once(sub));
    }
    let slot = match scheduler {
        Scheduler::Static => 0,
        Scheduler::Dynamic => match select_next(atoms, data, &sub, &remaining, session) {
            Some(slot) => slot,
            None => {
                // No unmatched atom is evaluable under the current bindings;
                // the branch cannot make progress.
                log::warn!("homomorphism search stuck: no evaluable atom remains");
                return Box::new(std::iter::empty());
            }
        },
    };
    let mut rest = remaining;
    let index = rest.remove(slot);
    let atom = &atoms[index];
    Box::new(
        match_atom(atom, data, &sub, session)
            .flat_map(move |ext| backtrack(atoms, data, ext, rest.clone(), scheduler, session)),
    )
}

/// Probe the data source for one atom and extend the substitution with each
/// matching tuple. Shared with the atomic prepared-query evaluator.
pub(crate) fn match_atom<'a>(
    atom: &Atom,
    data: &'a dyn ReadableData,
    sub: &Substitution,
    session: &'a Session,
) -> Box<dyn Iterator<Item = Substitution> + 'a> {
    let applied: Vec<Term> = atom
        .args
        .iter()
        .map(|&a| sub.apply_term(a, session))
        .collect();

    let mut query = BasicQuery::new(atom.predicate);
    let mut patterns: Vec<(usize, Term)> = Vec::new();
    for (pos, &term) in applied.iter().enumerate() {
        if session.is_ground(term) {
            query = query.bind(pos, term);
        } else {
            // Answer position; the pattern term is matched against the
            // returned value (covers repeated variables and function terms).
            let placeholder = match term {
                Term::Variable(v) => v,
                _ => match session.fresh_variable("pos").as_variable() {
                    Some(v) => v,
                    None => unreachable!("fresh_variable returns a variable"),
                },
            };
            query = query.answer(pos, placeholder);
            patterns.push((pos, term));
        }
    }

    let tuples = match data.evaluate(session, &query) {
        Ok(tuples) => tuples,
        Err(err) => {
            log::warn!("{err}");
            return Box::new(std::iter::empty());
        }
    };

    let answer_positions = query.answer_positions();
    let base = sub.clone();
    Box::new(tuples.filter_map(move |tuple| {
        let mut extended = base.clone();
        for (pos, pattern) in &patterns {
            let slot = answer_positions
                .iter()
                .position(|p| p == pos)
                .expect("answer position present");
            if !match_term(*pattern, tuple[slot], &mut extended, session) {
                return None;
            }
        }
        Some(extended)
    }))
}

/// Match a body atom against one stored fact, extending the substitution.
/// Used by delta-seeded trigger computation.
pub(crate) fn match_atom_against_fact(
    pattern: &Atom,
    fact: &Atom,
    sub: &Substitution,
    session: &Session,
) -> Option<Substitution> {
    if pattern.predicate != fact.predicate || pattern.args.len() != fact.args.len() {
        return None;
    }
    let mut extended = sub.clone();
    for (&p, &f) in pattern.args.iter().zip(fact.args.iter()) {
        if !match_term(p, f, &mut extended, session) {
            return None;
        }
    }
    Some(extended)
}

/// One-way matching of a pattern term against a (ground) value.
fn match_term(pattern: Term, value: Term, sub: &mut Substitution, session: &Session) -> bool {
    let pattern = sub.apply_term(pattern, session);
    if pattern == value {
        return true;
    }
    match pattern {
        Term::Variable(v) => {
            sub.bind(v, value);
            true
        }
        Term::Function(p) => match value {
            Term::Function(q) => {
                let pd = session.fn_term(p);
                let qd = session.fn_term(q);
                if pd.symbol != qd.symbol
                    || pd.evaluable != qd.evaluable
                    || pd.args.len() != qd.args.len()
                {
                    return false;
                }
                pd.args
                    .iter()
                    .zip(qd.args.iter())
                    .all(|(&a, &b)| match_term(a, b, sub, session))
            }
            _ => false,
        },
        _ => false,
    }
}

/// Dynamic selection: smallest estimated bound among evaluable atoms, ties
/// by fewer free variables then insertion order. Returns the slot in
/// `remaining`.
fn select_next(
    atoms: &[Atom],
    data: &dyn ReadableData,
    sub: &Substitution,
    remaining: &[usize],
    session: &Session,
) -> Option<usize> {
    let mut best: Option<(usize, usize, usize)> = None; // (bound, free vars, slot)
    for (slot, &index) in remaining.iter().enumerate() {
        let atom = &atoms[index];
        let applied: Vec<Term> = atom
            .args
            .iter()
            .map(|&a| sub.apply_term(a, session))
            .collect();
        let mut query = BasicQuery::new(atom.predicate);
        let mut free = 0usize;
        for (pos, &term) in applied.iter().enumerate() {
            if session.is_ground(term) {
                query = query.bind(pos, term);
            } else {
                free += 1;
            }
        }
        if !data.can_evaluate(session, &query) {
            continue;
        }
        let bound = data
            .estimate_bound(session, &query)
            .unwrap_or(usize::MAX);
        let candidate = (bound, free, slot);
        if best.map_or(true, |b| candidate < b) {
            best = Some(candidate);
        }
    }
    best.map(|(_, _, slot)| slot)
}

/// Static ordering: greedily maximize shared-variable overlap with the
/// already-scheduled prefix.
fn static_order(atoms: &[Atom], session: &Session) -> Vec<usize> {
    let vars: Vec<IndexSet<crate::id::VarId>> =
        atoms.iter().map(|a| a.variables(session)).collect();
    let mut order: Vec<usize> = Vec::with_capacity(atoms.len());
    let mut seen: IndexSet<crate::id::VarId> = IndexSet::new();
    let mut pending: Vec<usize> = (0..atoms.len()).collect();

    while !pending.is_empty() {
        let (slot, &index) = pending
            .iter()
            .enumerate()
            .max_by_key(|(slot, &index)| {
                let overlap = vars[index].iter().filter(|v| seen.contains(*v)).count();
                let ground = atoms[index].args.len().saturating_sub(vars[index].len());
                // Insertion order breaks ties (earlier wins).
                (overlap, ground, usize::MAX - *slot)
            })
            .expect("pending non-empty");
        seen.extend(vars[index].iter().copied());
        order.push(index);
        pending.remove(slot);
    }
    order
}
