//! Conjunctive-query containment.
//!
//! `general` subsumes `specific` when a homomorphism maps the atoms of
//! `general` into the atoms of `specific` (whose variables are rigid) while
//! sending the answer signature position-wise onto `specific`'s. This is
//! the hot inner loop of UCQ cover computation, so a predicate prefilter
//! runs before any search.

use crate::formula::ConjunctiveQuery;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// Does `general` subsume `specific`?
pub fn subsumes(
    general: &ConjunctiveQuery,
    specific: &ConjunctiveQuery,
    session: &Session,
) -> bool {
    if general.answer_variables.len() != specific.answer_variables.len() {
        return false;
    }
    // Prefilter: every predicate of the general query must occur in the
    // specific one.
    for atom in general.atoms() {
        if !specific.atoms().iter().any(|a| a.predicate == atom.predicate) {
            return false;
        }
    }

    // The answer signature is pinned position-wise.
    let mut initial = Substitution::new();
    for (&g, &s) in general
        .answer_variables
        .iter()
        .zip(specific.answer_variables.iter())
    {
        if g != s {
            initial.bind(g, Term::Variable(s));
        }
    }

    embed(general, specific, 0, initial, session)
}

fn embed(
    general: &ConjunctiveQuery,
    specific: &ConjunctiveQuery,
    index: usize,
    sub: Substitution,
    session: &Session,
) -> bool {
    if index == general.atoms().len() {
        return true;
    }
    let atom = &general.atoms()[index];
    for candidate in specific.atoms() {
        if candidate.predicate != atom.predicate {
            continue;
        }
        let mut extended = sub.clone();
        let mut ok = true;
        for (&pattern, &target) in atom.args.iter().zip(candidate.args.iter()) {
            if !match_rigid(pattern, target, &mut extended, session) {
                ok = false;
                break;
            }
        }
        if ok && embed(general, specific, index + 1, extended, session) {
            return true;
        }
    }
    false
}

/// Match a pattern term against a rigid target term: pattern variables
/// bind, everything in the target is inert.
fn match_rigid(pattern: Term, target: Term, sub: &mut Substitution, session: &Session) -> bool {
    let pattern = sub.apply_term(pattern, session);
    if pattern == target {
        return true;
    }
    match pattern {
        Term::Variable(v) => {
            sub.bind(v, target);
            true
        }
        Term::Function(p) => match target {
            Term::Function(t) => {
                let pd = session.fn_term(p);
                let td = session.fn_term(t);
                if pd.symbol != td.symbol
                    || pd.evaluable != td.evaluable
                    || pd.args.len() != td.args.len()
                {
                    return false;
                }
                pd.args
                    .iter()
                    .zip(td.args.iter())
                    .all(|(&a, &b)| match_rigid(a, b, sub, session))
            }
            _ => false,
        },
        _ => false,
    }
}
