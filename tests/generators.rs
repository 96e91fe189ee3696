//! Shared proptest generators.
//!
//! Strategies produce plain descriptors (indices into small pools); tests
//! realize them against a fresh session. This keeps strategies independent
//! of interner state.

use proptest::prelude::*;

use datalex::atom::Atom;
use datalex::id::VarId;
use datalex::substitution::Substitution;
use datalex::term::Term;
use datalex::Session;

pub const VAR_POOL: [&str; 4] = ["X", "Y", "Z", "W"];
pub const CONST_POOL: [&str; 4] = ["a", "b", "c", "d"];
pub const PRED_POOL: [&str; 3] = ["p", "q", "r"];

/// A term descriptor over the pools.
#[derive(Clone, Debug)]
pub enum TermDesc {
    Var(usize),
    Const(usize),
    Int(i64),
}

impl TermDesc {
    pub fn realize(&self, session: &Session) -> Term {
        match self {
            TermDesc::Var(i) => session.variable(VAR_POOL[i % VAR_POOL.len()]),
            TermDesc::Const(i) => session.constant(CONST_POOL[i % CONST_POOL.len()]),
            TermDesc::Int(i) => session.int(*i),
        }
    }
}

pub fn arb_term() -> impl Strategy<Value = TermDesc> {
    prop_oneof![
        (0usize..VAR_POOL.len()).prop_map(TermDesc::Var),
        (0usize..CONST_POOL.len()).prop_map(TermDesc::Const),
        (-3i64..4).prop_map(TermDesc::Int),
    ]
}

/// Ground term descriptors only.
pub fn arb_ground_term() -> impl Strategy<Value = TermDesc> {
    prop_oneof![
        (0usize..CONST_POOL.len()).prop_map(TermDesc::Const),
        (-3i64..4).prop_map(TermDesc::Int),
    ]
}

/// A substitution descriptor: variable index to term.
pub fn arb_substitution() -> impl Strategy<Value = Vec<(usize, TermDesc)>> {
    prop::collection::vec(((0usize..VAR_POOL.len()), arb_term()), 0..4)
}

pub fn realize_substitution(desc: &[(usize, TermDesc)], session: &Session) -> Substitution {
    let mut sub = Substitution::new();
    for (var, term) in desc {
        let v = match session.variable(VAR_POOL[var % VAR_POOL.len()]) {
            Term::Variable(v) => v,
            _ => unreachable!(),
        };
        sub.bind(v, term.realize(session));
    }
    sub
}

/// A ground atom descriptor: predicate index, then ground argument
/// descriptors (arity fixed at 2 to keep joins interesting).
pub fn arb_fact() -> impl Strategy<Value = (usize, (usize, usize))> {
    (
        0usize..PRED_POOL.len(),
        (0usize..CONST_POOL.len(), 0usize..CONST_POOL.len()),
    )
}

pub fn realize_fact(desc: &(usize, (usize, usize)), session: &Session) -> Atom {
    let predicate = session.predicate(PRED_POOL[desc.0], 2);
    let args = vec![
        session.constant(CONST_POOL[desc.1 .0]),
        session.constant(CONST_POOL[desc.1 .1]),
    ];
    Atom::new(predicate, args)
}

/// A query atom descriptor: predicate index plus variable-or-constant
/// argument descriptors.
#[derive(Clone, Debug)]
pub enum ArgDesc {
    Var(usize),
    Const(usize),
}

pub fn arb_query_atom() -> impl Strategy<Value = (usize, Vec<ArgDesc>)> {
    let arg = prop_oneof![
        (0usize..VAR_POOL.len()).prop_map(ArgDesc::Var),
        (0usize..CONST_POOL.len()).prop_map(ArgDesc::Const),
    ];
    (0usize..PRED_POOL.len(), prop::collection::vec(arg, 2..=2))
}

pub fn realize_query_atom(desc: &(usize, Vec<ArgDesc>), session: &Session) -> Atom {
    let predicate = session.predicate(PRED_POOL[desc.0], 2);
    let args = desc
        .1
        .iter()
        .map(|a| match a {
            ArgDesc::Var(i) => session.variable(VAR_POOL[i % VAR_POOL.len()]),
            ArgDesc::Const(i) => session.constant(CONST_POOL[i % CONST_POOL.len()]),
        })
        .collect();
    Atom::new(predicate, args)
}

/// The variables of a realized atom list.
pub fn query_variables(atoms: &[Atom], session: &Session) -> Vec<VarId> {
    let mut vars = indexmap::IndexSet::new();
    for atom in atoms {
        vars.extend(atom.variables(session));
    }
    vars.into_iter().collect()
}
