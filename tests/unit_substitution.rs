//! Unit tests for substitutions and term partitions.

use indexmap::IndexSet;

use datalex::partition::TermPartition;
use datalex::substitution::{safe_renaming, Substitution};
use datalex::term::Term;
use datalex::Session;

fn var(session: &Session, name: &str) -> (datalex::id::VarId, Term) {
    let term = session.variable(name);
    match term {
        Term::Variable(v) => (v, term),
        _ => unreachable!("variable"),
    }
}

#[test]
fn apply_compose_law() {
    let session = Session::new();
    let (x, xt) = var(&session, "X");
    let (y, yt) = var(&session, "Y");
    let a = session.constant("a");

    let mut tau = Substitution::new();
    tau.bind(x, yt);
    let mut sigma = Substitution::new();
    sigma.bind(y, a);

    let composed = sigma.compose(&tau, &session);
    let f = session.logical_function_term("f", vec![xt, yt]);
    assert_eq!(
        composed.apply_term(f, &session),
        sigma.apply_term(tau.apply_term(f, &session), &session)
    );
    // tau acts first: X goes through Y to a.
    assert_eq!(composed.apply_term(xt, &session), a);
}

#[test]
fn normalize_resolves_chains_and_is_idempotent() {
    let session = Session::new();
    let (x, _) = var(&session, "X");
    let (y, yt) = var(&session, "Y");
    let a = session.constant("a");

    let mut sub = Substitution::new();
    sub.bind(x, yt);
    sub.bind(y, a);

    let normalized = sub.normalize();
    assert_eq!(normalized.get(x), Some(a));
    assert_eq!(normalized.get(y), Some(a));
    assert_eq!(normalized.normalize(), normalized);
}

#[test]
fn identity_bindings_are_dropped() {
    let session = Session::new();
    let (x, xt) = var(&session, "X");
    let mut sub = Substitution::new();
    sub.bind(x, xt);
    assert!(sub.is_empty());
    let _ = session;
}

#[test]
fn restrict_to_keeps_only_requested_variables() {
    let session = Session::new();
    let (x, _) = var(&session, "X");
    let (y, _) = var(&session, "Y");
    let a = session.constant("a");
    let b = session.constant("b");

    let mut sub = Substitution::new();
    sub.bind(x, a);
    sub.bind(y, b);

    let mut keep = IndexSet::new();
    keep.insert(x);
    let restricted = sub.restrict_to(&keep);
    assert_eq!(restricted.get(x), Some(a));
    assert_eq!(restricted.get(y), None);
}

#[test]
fn safe_renaming_commutes_with_later_bindings() {
    let session = Session::new();
    let (x, xt) = var(&session, "X");
    let a = session.constant("a");

    let mut vars = IndexSet::new();
    vars.insert(x);
    let renaming = safe_renaming(&vars, &session);
    let fresh = renaming.apply_term(xt, &session);
    assert_ne!(fresh, xt);
    assert!(fresh.is_variable());

    // Applying the renaming then a binding of the original variable leaves
    // the fresh variable alone.
    let mut later = Substitution::new();
    later.bind(x, a);
    assert_eq!(later.apply_term(fresh, &session), fresh);
}

#[test]
fn partition_union_and_join() {
    let session = Session::new();
    let (_, xt) = var(&session, "X");
    let (_, yt) = var(&session, "Y");
    let (_, zt) = var(&session, "Z");
    let a = session.constant("a");

    let mut p = TermPartition::new();
    p.union(xt, yt);
    assert!(p.same_class(xt, yt));
    assert!(!p.same_class(xt, zt));

    let mut q = TermPartition::new();
    q.union(yt, zt);
    p.join(&q);
    assert!(p.same_class(xt, zt));

    p.union(zt, a);
    assert!(p.same_class(xt, a));
    assert!(p.is_admissible(&session));
}

#[test]
fn partition_conflict_detection() {
    let session = Session::new();
    let (_, xt) = var(&session, "X");
    let a = session.constant("a");
    let b = session.constant("b");

    let mut p = TermPartition::new();
    p.union(xt, a);
    p.union(xt, b);
    assert!(!p.is_admissible(&session));

    let empty = IndexSet::new();
    assert!(p.associated_substitution(&empty, &empty, &session).is_none());
}

#[test]
fn partition_substitution_elects_ground_representatives() {
    let session = Session::new();
    let (x, xt) = var(&session, "X");
    let (y, yt) = var(&session, "Y");
    let a = session.constant("a");

    let mut p = TermPartition::new();
    p.union(xt, yt);
    p.union(yt, a);

    let empty = IndexSet::new();
    let sub = p
        .associated_substitution(&empty, &empty, &session)
        .expect("admissible");
    assert_eq!(sub.get(x), Some(a));
    assert_eq!(sub.get(y), Some(a));
}

#[test]
fn partition_validity_isolates_existentials() {
    let session = Session::new();
    let (x, xt) = var(&session, "X");
    let (e, et) = var(&session, "E");
    let a = session.constant("a");

    let mut existentials = IndexSet::new();
    existentials.insert(e);
    let mut frontier = IndexSet::new();
    frontier.insert(x);
    let answers = IndexSet::new();

    // Existential with a plain query variable: fine.
    let (_, ut) = var(&session, "U");
    let mut ok = TermPartition::new();
    ok.union(ut, et);
    assert!(ok.is_valid(&existentials, &frontier, &answers, &session));

    // Existential with a frontier variable: rejected.
    let mut bad = TermPartition::new();
    bad.union(xt, et);
    assert!(!bad.is_valid(&existentials, &frontier, &answers, &session));

    // Existential with a ground term: rejected.
    let mut ground = TermPartition::new();
    ground.union(et, a);
    assert!(!ground.is_valid(&existentials, &frontier, &answers, &session));
}
