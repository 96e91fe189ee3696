//! Unit tests for breadth-first UCQ rewriting.

use datalex::atom::Atom;
use datalex::formula::{ConjunctiveQuery, Formula, UnionQuery};
use datalex::query::containment::subsumes;
use datalex::rewriting::ucq::{compute_cover, rewrite};
use datalex::rule::Rule;
use datalex::term::Term;
use datalex::Session;

fn atom(session: &Session, name: &str, args: &[Term]) -> Atom {
    Atom::new(session.predicate(name, args.len()), args.to_vec())
}

fn v(session: &Session, name: &str) -> Term {
    session.variable(name)
}

fn var_id(term: Term) -> datalex::id::VarId {
    match term {
        Term::Variable(id) => id,
        _ => unreachable!("variable"),
    }
}

#[test]
fn atomic_query_rewrites_through_an_existential_rule() {
    // rule: t(Y) :- p(X,Y).  query: ?(U) :- t(U).
    // Expected union: { t(U) ; p(_, U') } modulo renaming.
    let session = Session::new();
    let (x, y, u) = (v(&session, "X"), v(&session, "Y"), v(&session, "U"));
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x, y])),
        Formula::Atom(atom(&session, "t", &[y])),
    );
    let query = ConjunctiveQuery::new([atom(&session, "t", &[u])], vec![var_id(u)]);
    let ucq = UnionQuery::new([query], vec![var_id(u)]);

    let result = rewrite(&ucq, &[rule], 0, &session);
    assert_eq!(result.len(), 2);

    let p = session.predicate("p", 2);
    let t = session.predicate("t", 1);
    let p_cq = result
        .iter()
        .find(|cq| cq.atoms()[0].predicate == p)
        .expect("rewritten disjunct");
    assert_eq!(p_cq.atoms().len(), 1);
    // The answer variable sits in the frontier position.
    let answer = p_cq.answer_variables[0];
    assert_eq!(p_cq.atoms()[0].args[1], Term::Variable(answer));
    assert!(result.iter().any(|cq| cq.atoms()[0].predicate == t));
}

#[test]
fn rewriting_respects_the_step_limit() {
    // r1: q(X) :- r(X).  r2: r(X) :- s(X).  query: ?(U) :- q(U).
    let session = Session::new();
    let (x, u) = (v(&session, "X"), v(&session, "U"));
    let r1 = Rule::new(
        Formula::Atom(atom(&session, "r", &[x])),
        Formula::Atom(atom(&session, "q", &[x])),
    );
    let r2 = Rule::new(
        Formula::Atom(atom(&session, "s", &[x])),
        Formula::Atom(atom(&session, "r", &[x])),
    );
    let query = ConjunctiveQuery::new([atom(&session, "q", &[u])], vec![var_id(u)]);
    let ucq = UnionQuery::new([query], vec![var_id(u)]);

    let one_step = rewrite(&ucq, &[r1.clone(), r2.clone()], 1, &session);
    assert_eq!(one_step.len(), 2); // q and r

    let full = rewrite(&ucq, &[r1, r2], 0, &session);
    assert_eq!(full.len(), 3); // q, r and s
}

#[test]
fn subsumed_rewritings_are_discarded() {
    // rule: q(X) :- q'(X) where a broader disjunct already covers the
    // rewriting.
    let session = Session::new();
    let (x, u) = (v(&session, "X"), v(&session, "U"));
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x])),
        Formula::Atom(atom(&session, "q", &[x])),
    );
    // The union already holds ?(U) :- p(U): the rewriting of q adds
    // nothing new.
    let q_cq = ConjunctiveQuery::new([atom(&session, "q", &[u])], vec![var_id(u)]);
    let p_cq = ConjunctiveQuery::new([atom(&session, "p", &[u])], vec![var_id(u)]);
    let ucq = UnionQuery::new([q_cq, p_cq], vec![var_id(u)]);

    let result = rewrite(&ucq, &[rule], 0, &session);
    assert_eq!(result.len(), 2);

    // Minimality: no disjunct subsumes another.
    for (i, a) in result.iter().enumerate() {
        for (j, b) in result.iter().enumerate() {
            if i != j {
                assert!(!subsumes(a, b, &session));
            }
        }
    }
}

#[test]
fn cover_removes_subsumed_disjuncts() {
    let session = Session::new();
    let (x, y, u) = (v(&session, "X"), v(&session, "Y"), v(&session, "U"));
    // p(X,Y) subsumes p(U,U): the specific disjunct goes away.
    let general = ConjunctiveQuery::new([atom(&session, "p", &[x, y])], Vec::new());
    let specific = ConjunctiveQuery::new([atom(&session, "p", &[u, u])], Vec::new());
    let ucq = UnionQuery::new([specific, general], Vec::new());
    let cover = compute_cover(&ucq, &session);
    assert_eq!(cover.len(), 1);
    assert_eq!(cover.conjunctive_queries()[0].atoms().len(), 1);
    let kept = &cover.conjunctive_queries()[0].atoms()[0];
    assert_ne!(kept.args[0], kept.args[1]);
}

#[test]
fn disjunctive_rule_rewrites_through_one_disjunct() {
    // S5: rule q(X) | r(Y) :- p(X,Y); query ?(U) :- q(U).
    // Expected union: { q(U) ; p(U, _) } modulo renaming.
    let session = Session::new();
    let (x, y, u) = (v(&session, "X"), v(&session, "Y"), v(&session, "U"));
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x, y])),
        Formula::Disjunction(vec![
            Formula::Atom(atom(&session, "q", &[x])),
            Formula::Atom(atom(&session, "r", &[y])),
        ]),
    );
    let query = ConjunctiveQuery::new([atom(&session, "q", &[u])], vec![var_id(u)]);
    let ucq = UnionQuery::new([query], vec![var_id(u)]);

    let result = rewrite(&ucq, &[rule], 0, &session);
    assert_eq!(result.len(), 2);

    let p = session.predicate("p", 2);
    let p_cq = result
        .iter()
        .find(|cq| cq.atoms().iter().any(|a| a.predicate == p))
        .expect("rewriting through the first disjunct");
    assert_eq!(p_cq.atoms().len(), 1);
    let answer = p_cq.answer_variables[0];
    // The frontier of the unified disjunct carries the answer variable;
    // the other position is a free variable.
    assert_eq!(p_cq.atoms()[0].args[0], Term::Variable(answer));
    assert!(p_cq.atoms()[0].args[1].is_variable());
    assert_ne!(p_cq.atoms()[0].args[1], Term::Variable(answer));
}

#[test]
fn cross_disjunct_unification_consumes_both_query_atoms() {
    // rule: q(X) | r(X) :- p(X); query ?() :- q(U), r(U).
    // Unifying q(U) with the first disjunct and r(U) with the second
    // yields ?() :- p(U).
    let session = Session::new();
    let (x, u) = (v(&session, "X"), v(&session, "U"));
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x])),
        Formula::Disjunction(vec![
            Formula::Atom(atom(&session, "q", &[x])),
            Formula::Atom(atom(&session, "r", &[x])),
        ]),
    );
    let query = ConjunctiveQuery::new(
        [atom(&session, "q", &[u]), atom(&session, "r", &[u])],
        Vec::new(),
    );
    let ucq = UnionQuery::new([query], Vec::new());

    let result = rewrite(&ucq, &[rule], 0, &session);
    let p = session.predicate("p", 1);
    assert!(result
        .iter()
        .any(|cq| cq.atoms().len() == 1 && cq.atoms()[0].predicate == p));
}
