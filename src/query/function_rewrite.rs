//! Function-term rewriting.
//!
//! Evaluable function terms are folded away before evaluation: every
//! occurrence `f(t1, ..., tn)` inside an atom is replaced by a fresh
//! variable `R`, and the computed atom `__func__f(t1, ..., tn, R)` is
//! conjoined at the atom's scope. Nested evaluable terms rewrite inside
//! out, so the computed atom's own arguments are already flat.
//!
//! Both the atomic and the conjunctive evaluators go through this one
//! helper, which keeps their rewriting behaviour identical.

use crate::atom::Atom;
use crate::formula::Formula;
use crate::session::Session;
use crate::term::Term;

/// True iff some atom of the formula carries an evaluable function term.
pub fn formula_contains_evaluable(formula: &Formula, session: &Session) -> bool {
    formula
        .atoms()
        .iter()
        .any(|a| a.contains_evaluable(session))
}

/// Rewrite one atom: the computed atoms introduced for its evaluable
/// function terms, followed by the atom with those terms replaced by the
/// result variables.
pub fn rewrite_atom(atom: &Atom, session: &Session) -> (Vec<Atom>, Atom) {
    let mut computed = Vec::new();
    let args: Vec<Term> = atom
        .args
        .iter()
        .map(|&arg| rewrite_term(arg, session, &mut computed))
        .collect();
    (computed, Atom::new(atom.predicate, args))
}

fn rewrite_term(term: Term, session: &Session, computed: &mut Vec<Atom>) -> Term {
    match term {
        Term::Function(id) => {
            let data = session.fn_term(id);
            let args: Vec<Term> = data
                .args
                .iter()
                .map(|&a| rewrite_term(a, session, computed))
                .collect();
            if data.evaluable {
                let result = session.fresh_variable("R");
                let predicate =
                    session.function_predicate(&session.symbol_name(data.symbol), args.len());
                let mut computed_args = args;
                computed_args.push(result);
                computed.push(Atom::new(predicate, computed_args));
                result
            } else if args == data.args {
                term
            } else {
                session.function_term(data.symbol, args, false)
            }
        }
        _ => term,
    }
}

/// Rewrite every atom of a formula in place: an atom with evaluable terms
/// becomes the conjunction of its computed atoms and its rewritten self.
pub fn expand_formula(formula: &Formula, session: &Session) -> Formula {
    match formula {
        Formula::Atom(atom) => {
            if !atom.contains_evaluable(session) {
                return formula.clone();
            }
            let (computed, rewritten) = rewrite_atom(atom, session);
            let mut parts: Vec<Formula> = computed.into_iter().map(Formula::Atom).collect();
            parts.push(Formula::Atom(rewritten));
            Formula::Conjunction(parts)
        }
        Formula::Conjunction(xs) => {
            Formula::Conjunction(xs.iter().map(|x| expand_formula(x, session)).collect())
        }
        Formula::Disjunction(xs) => {
            Formula::Disjunction(xs.iter().map(|x| expand_formula(x, session)).collect())
        }
        Formula::Negation(x) => Formula::Negation(Box::new(expand_formula(x, session))),
        Formula::Existential(vars, x) => {
            Formula::Existential(vars.clone(), Box::new(expand_formula(x, session)))
        }
        Formula::Universal(vars, x) => {
            Formula::Universal(vars.clone(), Box::new(expand_formula(x, session)))
        }
    }
}
