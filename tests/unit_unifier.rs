//! Unit tests for piece-unifier enumeration.

use indexmap::IndexSet;

use datalex::atom::Atom;
use datalex::formula::{ConjunctiveQuery, Formula};
use datalex::rewriting::unifier::most_general_piece_unifiers;
use datalex::rule::Rule;
use datalex::term::Term;
use datalex::Session;

fn atom(session: &Session, name: &str, args: &[Term]) -> Atom {
    Atom::new(session.predicate(name, args.len()), args.to_vec())
}

fn v(session: &Session, name: &str) -> Term {
    session.variable(name)
}

fn rule(session: &Session, head: Vec<Atom>, body: Vec<Atom>) -> Rule {
    Rule::new(
        Formula::conjunction_of(body),
        Formula::conjunction_of(head),
    )
}

/// The unified parts, as sets of atoms, sorted for comparison.
fn unified_parts(
    query: &ConjunctiveQuery,
    rule: &Rule,
    session: &Session,
) -> Vec<Vec<Atom>> {
    let mut parts: Vec<Vec<Atom>> = most_general_piece_unifiers(query, rule, session)
        .into_iter()
        .map(|u| {
            let mut atoms = u.unified_query_part.clone();
            atoms.sort();
            atoms
        })
        .collect();
    parts.sort();
    parts
}

#[test]
fn existential_sticky_variables_force_aggregation() {
    // rule: r(X,Y), q(Y) :- p(X).  query: ?() :- r(U,V), q(V), r(U,U).
    let session = Session::new();
    let (x, y, u, vv) = (
        v(&session, "X"),
        v(&session, "Y"),
        v(&session, "U"),
        v(&session, "V"),
    );
    let rule = rule(
        &session,
        vec![atom(&session, "r", &[x, y]), atom(&session, "q", &[y])],
        vec![atom(&session, "p", &[x])],
    );
    let query = ConjunctiveQuery::new(
        [
            atom(&session, "r", &[u, vv]),
            atom(&session, "q", &[vv]),
            atom(&session, "r", &[u, u]),
        ],
        Vec::new(),
    );

    let unifiers = most_general_piece_unifiers(&query, &rule, &session);
    assert_eq!(unifiers.len(), 1);
    let unifier = &unifiers[0];
    let unified: IndexSet<Atom> = unifier.unified_query_part.iter().cloned().collect();
    let expected: IndexSet<Atom> = [
        atom(&session, "r", &[u, vv]),
        atom(&session, "q", &[vv]),
    ]
    .into_iter()
    .collect();
    assert_eq!(unified, expected);
    assert!(unifier.partition.same_class(u, x));
    assert!(unifier.partition.same_class(vv, y));
    assert!(!unifier.partition.same_class(u, y));
}

#[test]
fn single_atom_query_unifies_with_an_existential_head() {
    // rule: t(Y) :- r(X), p(X,Y).  query: ?() :- t(U).
    let session = Session::new();
    let (x, y, u) = (v(&session, "X"), v(&session, "Y"), v(&session, "U"));
    let rule = rule(
        &session,
        vec![atom(&session, "t", &[y])],
        vec![atom(&session, "r", &[x]), atom(&session, "p", &[x, y])],
    );
    let query = ConjunctiveQuery::new([atom(&session, "t", &[u])], Vec::new());

    let unifiers = most_general_piece_unifiers(&query, &rule, &session);
    assert_eq!(unifiers.len(), 1);
    assert!(unifiers[0].partition.same_class(u, y));
    assert!(unifiers[0].not_unified_part().is_empty());
}

#[test]
fn shared_existential_images_merge_pieces() {
    // rule: p(X,Y) :- q(X).  query: ?() :- p(U,V), p(W,V), p(W,T), r(U,W).
    let session = Session::new();
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let (u, w, t, vv) = (
        v(&session, "U"),
        v(&session, "W"),
        v(&session, "T"),
        v(&session, "V"),
    );
    let rule = rule(
        &session,
        vec![atom(&session, "p", &[x, y])],
        vec![atom(&session, "q", &[x])],
    );
    let query = ConjunctiveQuery::new(
        [
            atom(&session, "p", &[u, vv]),
            atom(&session, "p", &[w, vv]),
            atom(&session, "p", &[w, t]),
            atom(&session, "r", &[u, w]),
        ],
        Vec::new(),
    );

    let parts = unified_parts(&query, &rule, &session);
    let mut expected = vec![
        {
            let mut atoms = vec![
                atom(&session, "p", &[u, vv]),
                atom(&session, "p", &[w, vv]),
            ];
            atoms.sort();
            atoms
        },
        vec![atom(&session, "p", &[w, t])],
    ];
    expected.sort();
    assert_eq!(parts, expected);
}

#[test]
fn rules_without_existentials_unify_atom_by_atom() {
    // rule: p(X,Y) :- q(X,Y).  query: ?() :- p(U,V), p(W,V), r(W,U).
    let session = Session::new();
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let (u, w, vv) = (v(&session, "U"), v(&session, "W"), v(&session, "V"));
    let rule = rule(
        &session,
        vec![atom(&session, "p", &[x, y])],
        vec![atom(&session, "q", &[x, y])],
    );
    let query = ConjunctiveQuery::new(
        [
            atom(&session, "p", &[u, vv]),
            atom(&session, "p", &[w, vv]),
            atom(&session, "r", &[w, u]),
        ],
        Vec::new(),
    );

    let parts = unified_parts(&query, &rule, &session);
    let mut expected = vec![
        vec![atom(&session, "p", &[u, vv])],
        vec![atom(&session, "p", &[w, vv])],
    ];
    expected.sort();
    assert_eq!(parts, expected);
}

#[test]
fn partially_existential_heads_aggregate_on_the_existential_position() {
    // rule: p(X,Z) :- q(X,Y).  query: ?() :- p(U,V), p(W,V), r(W,U).
    let session = Session::new();
    let (x, z) = (v(&session, "X"), v(&session, "Z"));
    let (u, w, vv) = (v(&session, "U"), v(&session, "W"), v(&session, "V"));
    let rule = rule(
        &session,
        vec![atom(&session, "p", &[x, z])],
        vec![atom(&session, "q", &[x, v(&session, "Y")])],
    );
    let query = ConjunctiveQuery::new(
        [
            atom(&session, "p", &[u, vv]),
            atom(&session, "p", &[w, vv]),
            atom(&session, "r", &[w, u]),
        ],
        Vec::new(),
    );

    let unifiers = most_general_piece_unifiers(&query, &rule, &session);
    assert_eq!(unifiers.len(), 1);
    let unifier = &unifiers[0];
    assert_eq!(unifier.unified_query_part.len(), 2);
    // U and W collapse onto the frontier variable X; V onto Z.
    assert!(unifier.partition.same_class(u, w));
    assert!(unifier.partition.same_class(u, x));
    assert!(unifier.partition.same_class(vv, z));
}

#[test]
fn boolean_query_unifies_against_fully_existential_position() {
    // rule: q(X,Y) :- s(X).  query: ?() :- q(V,U).
    let session = Session::new();
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let (u, vv) = (v(&session, "U"), v(&session, "V"));
    let rule = rule(
        &session,
        vec![atom(&session, "q", &[x, y])],
        vec![atom(&session, "s", &[x])],
    );
    let query = ConjunctiveQuery::new([atom(&session, "q", &[vv, u])], Vec::new());
    assert_eq!(most_general_piece_unifiers(&query, &rule, &session).len(), 1);
}

#[test]
fn answer_variables_block_existential_unification() {
    // Same shape, but U is an answer variable: no unifier may identify it
    // with the existential Y.
    let session = Session::new();
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let (u, vv) = (v(&session, "U"), v(&session, "V"));
    let u_id = match u {
        Term::Variable(id) => id,
        _ => unreachable!(),
    };
    let rule = rule(
        &session,
        vec![atom(&session, "q", &[x, y])],
        vec![atom(&session, "s", &[x])],
    );
    let query = ConjunctiveQuery::new([atom(&session, "q", &[vv, u])], vec![u_id]);
    assert!(most_general_piece_unifiers(&query, &rule, &session).is_empty());
}

#[test]
fn constants_in_matched_positions_must_agree() {
    let session = Session::new();
    let x = v(&session, "X");
    let a = session.constant("a");
    let b = session.constant("b");
    let rule = rule(
        &session,
        vec![atom(&session, "p", &[a, x])],
        vec![atom(&session, "q", &[x])],
    );
    let matching = ConjunctiveQuery::new([atom(&session, "p", &[a, b])], Vec::new());
    assert_eq!(most_general_piece_unifiers(&matching, &rule, &session).len(), 1);
    let clashing = ConjunctiveQuery::new([atom(&session, "p", &[b, b])], Vec::new());
    assert!(most_general_piece_unifiers(&clashing, &rule, &session).is_empty());
}
