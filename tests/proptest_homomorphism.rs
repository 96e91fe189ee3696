//! Property tests for homomorphism search: soundness and completeness
//! against a brute-force oracle on small random instances.

mod generators;

use datalex::atom::Atom;
use datalex::data::fact_base::InMemoryFactBase;
use datalex::data::ReadableData;
use datalex::homomorphism::homomorphisms;
use datalex::id::VarId;
use datalex::substitution::Substitution;
use datalex::term::Term;
use datalex::Session;
use generators::{arb_fact, arb_query_atom, query_variables, realize_fact, realize_query_atom};
use proptest::prelude::*;

/// All total assignments of `vars` over `domain`.
fn assignments(vars: &[VarId], domain: &[Term]) -> Vec<Substitution> {
    let mut out = vec![Substitution::new()];
    for &var in vars {
        let mut next = Vec::with_capacity(out.len() * domain.len());
        for sub in &out {
            for &term in domain {
                let mut extended = sub.clone();
                extended.bind(var, term);
                next.push(extended);
            }
        }
        out = next;
    }
    out
}

fn brute_force(
    query: &[Atom],
    facts: &InMemoryFactBase,
    vars: &[VarId],
    session: &Session,
) -> Vec<Vec<(VarId, Term)>> {
    let domain: Vec<Term> = facts.terms().unwrap_or_default();
    let mut results = Vec::new();
    for sub in assignments(vars, &domain) {
        if query
            .iter()
            .all(|atom| facts.contains(&atom.apply(&sub, session)))
        {
            results.push(sub.canonical_key());
        }
    }
    results.sort();
    results.dedup();
    results
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The backtracking enumeration equals the brute-force answer set.
    #[test]
    fn search_is_sound_and_complete(
        fact_descs in proptest::collection::vec(arb_fact(), 1..8),
        query_descs in proptest::collection::vec(arb_query_atom(), 1..4),
    ) {
        let session = Session::new();
        let facts = InMemoryFactBase::from_atoms(
            fact_descs.iter().map(|d| realize_fact(d, &session)),
        );
        let query: Vec<Atom> = query_descs
            .iter()
            .map(|d| realize_query_atom(d, &session))
            .collect();
        let vars = query_variables(&query, &session);

        let mut found: Vec<Vec<(VarId, Term)>> =
            homomorphisms(&query, &facts, Substitution::new(), &session)
                .map(|sub| {
                    // Restrict to the query variables before comparing.
                    let keep: indexmap::IndexSet<VarId> = vars.iter().copied().collect();
                    sub.restrict_to(&keep).canonical_key()
                })
                .collect();
        found.sort();
        found.dedup();

        let expected = brute_force(&query, &facts, &vars, &session);
        prop_assert_eq!(found, expected);
    }

    /// Every enumerated substitution embeds the query into the facts.
    #[test]
    fn images_always_land_in_the_fact_base(
        fact_descs in proptest::collection::vec(arb_fact(), 1..8),
        query_descs in proptest::collection::vec(arb_query_atom(), 1..3),
    ) {
        let session = Session::new();
        let facts = InMemoryFactBase::from_atoms(
            fact_descs.iter().map(|d| realize_fact(d, &session)),
        );
        let query: Vec<Atom> = query_descs
            .iter()
            .map(|d| realize_query_atom(d, &session))
            .collect();

        for sub in homomorphisms(&query, &facts, Substitution::new(), &session) {
            for atom in &query {
                prop_assert!(facts.contains(&atom.apply(&sub, &session)));
            }
        }
    }
}
