//! Unit tests for the graph of rule dependencies and stratification.

use datalex::atom::Atom;
use datalex::formula::Formula;
use datalex::grd::stratification::{
    hybrid_predicate_unifier, is_stratifiable, stratify, StratificationError,
    StratificationStrategy,
};
use datalex::grd::{DependencyMode, Grd};
use datalex::rule::Rule;
use datalex::term::Term;
use datalex::Session;

fn atom(session: &Session, name: &str, args: &[Term]) -> Atom {
    Atom::new(session.predicate(name, args.len()), args.to_vec())
}

fn v(session: &Session, name: &str) -> Term {
    session.variable(name)
}

/// r1: good(X) :- person(X), not bad(X).  r2: bad(X) :- criminal(X).
fn negation_rules(session: &Session) -> Vec<Rule> {
    let x = v(session, "X");
    let r1 = Rule::labeled(
        Formula::Conjunction(vec![
            Formula::Atom(atom(session, "person", &[x])),
            Formula::Negation(Box::new(Formula::Atom(atom(session, "bad", &[x])))),
        ]),
        Formula::Atom(atom(session, "good", &[x])),
        "r1",
    );
    let r2 = Rule::labeled(
        Formula::Atom(atom(session, "criminal", &[x])),
        Formula::Atom(atom(session, "bad", &[x])),
        "r2",
    );
    vec![r1, r2]
}

#[test]
fn predicate_mode_finds_positive_and_negative_edges() {
    let session = Session::new();
    let grd = Grd::new(negation_rules(&session), DependencyMode::Predicate, &session);
    // r2 produces bad, which r1 negates: one negative edge r2 -> r1.
    let edges: Vec<_> = grd.edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].source, 1);
    assert_eq!(edges[0].target, 0);
    assert!(!edges[0].positive);
    assert!(grd.prevented_rules(1).contains(&0));
    assert!(grd.triggered_rules(1).is_empty());
}

#[test]
fn unifier_mode_prunes_unmatchable_predicate_edges() {
    let session = Session::new();
    let x = v(&session, "X");
    let a = session.constant("a");
    let b = session.constant("b");
    // r1 produces p(a, X); r2 consumes p(b, Y): predicate mode sees an
    // edge, unifier mode rejects it on the clashing constants.
    let r1 = Rule::new(
        Formula::Atom(atom(&session, "s", &[x])),
        Formula::Atom(atom(&session, "p", &[a, x])),
    );
    let y = v(&session, "Y");
    let r2 = Rule::new(
        Formula::Atom(atom(&session, "p", &[b, y])),
        Formula::Atom(atom(&session, "t", &[y])),
    );

    let coarse = Grd::new(vec![r1.clone(), r2.clone()], DependencyMode::Predicate, &session);
    assert_eq!(coarse.edges().count(), 1);

    let precise = Grd::new(vec![r1, r2], DependencyMode::Unifier, &session);
    assert_eq!(precise.edges().count(), 0);
}

#[test]
fn unifier_mode_connects_matching_rules() {
    let session = Session::new();
    let x = v(&session, "X");
    let y = v(&session, "Y");
    let r1 = Rule::new(
        Formula::Atom(atom(&session, "s", &[x])),
        Formula::Atom(atom(&session, "p", &[x, y])),
    );
    let r2 = Rule::new(
        Formula::Atom(atom(&session, "p", &[x, y])),
        Formula::Atom(atom(&session, "t", &[x])),
    );
    let grd = Grd::new(vec![r1, r2], DependencyMode::Unifier, &session);
    assert!(grd.triggered_rules(0).contains(&1));
    assert!(grd.ancestors(1).contains(&0));
}

#[test]
fn disjunctive_heads_union_their_dependencies() {
    let session = Session::new();
    let x = v(&session, "X");
    let r1 = Rule::new(
        Formula::Atom(atom(&session, "s", &[x])),
        Formula::Disjunction(vec![
            Formula::Atom(atom(&session, "p", &[x])),
            Formula::Atom(atom(&session, "q", &[x])),
        ]),
    );
    let r2 = Rule::new(
        Formula::Atom(atom(&session, "p", &[x])),
        Formula::Atom(atom(&session, "t", &[x])),
    );
    let r3 = Rule::new(
        Formula::Atom(atom(&session, "q", &[x])),
        Formula::Atom(atom(&session, "u", &[x])),
    );
    for mode in [DependencyMode::Predicate, DependencyMode::Unifier, DependencyMode::Hybrid] {
        let grd = Grd::new(vec![r1.clone(), r2.clone(), r3.clone()], mode, &session);
        let triggered = grd.triggered_rules(0);
        assert!(triggered.contains(&1), "{mode:?}");
        assert!(triggered.contains(&2), "{mode:?}");
    }
}

#[test]
fn by_scc_orders_negation_backward() {
    // S6: r2 must land strictly before r1.
    let session = Session::new();
    let grd = Grd::new(negation_rules(&session), DependencyMode::Predicate, &session);
    assert!(is_stratifiable(&grd));
    let strata = stratify(&grd, StratificationStrategy::ByScc, &session).unwrap();
    assert_eq!(strata.len(), 2);
    assert_eq!(strata[0].rules()[0].label.as_deref(), Some("r2"));
    assert_eq!(strata[1].rules()[0].label.as_deref(), Some("r1"));
}

#[test]
fn negative_cycles_fail_stratification() {
    let session = Session::new();
    let x = v(&session, "X");
    // p :- not q; q :- not p.
    let r1 = Rule::new(
        Formula::Negation(Box::new(Formula::Atom(atom(&session, "q", &[x])))),
        Formula::Atom(atom(&session, "p", &[x])),
    );
    let r2 = Rule::new(
        Formula::Negation(Box::new(Formula::Atom(atom(&session, "p", &[x])))),
        Formula::Atom(atom(&session, "q", &[x])),
    );
    let grd = Grd::new(vec![r1, r2], DependencyMode::Predicate, &session);
    assert!(!is_stratifiable(&grd));
    assert_eq!(
        stratify(&grd, StratificationStrategy::ByScc, &session),
        Err(StratificationError::NegativeCycle)
    );
    assert_eq!(
        stratify(&grd, StratificationStrategy::Minimal, &session),
        Err(StratificationError::NegativeCycle)
    );
}

#[test]
fn minimal_levels_count_negations() {
    let session = Session::new();
    let x = v(&session, "X");
    // chain: a -> b (positive), b -> c (negative).
    let ra = Rule::labeled(
        Formula::Atom(atom(&session, "base", &[x])),
        Formula::Atom(atom(&session, "a", &[x])),
        "ra",
    );
    let rb = Rule::labeled(
        Formula::Atom(atom(&session, "a", &[x])),
        Formula::Atom(atom(&session, "b", &[x])),
        "rb",
    );
    let rc = Rule::labeled(
        Formula::Negation(Box::new(Formula::Atom(atom(&session, "b", &[x])))),
        Formula::Atom(atom(&session, "c", &[x])),
        "rc",
    );
    let grd = Grd::new(vec![ra, rb, rc], DependencyMode::Predicate, &session);
    let strata = stratify(&grd, StratificationStrategy::Minimal, &session).unwrap();
    // Positive dependencies are free: ra and rb share the first level, rc
    // sits strictly above.
    assert_eq!(strata.len(), 2);
    assert_eq!(strata[0].len(), 2);
    assert_eq!(strata[1].rules()[0].label.as_deref(), Some("rc"));
}

#[test]
fn single_evaluation_fails_on_positive_cycles() {
    let session = Session::new();
    let x = v(&session, "X");
    let y = v(&session, "Y");
    let z = v(&session, "Z");
    // Transitivity is self-dependent.
    let trans = Rule::new(
        Formula::Conjunction(vec![
            Formula::Atom(atom(&session, "p", &[x, y])),
            Formula::Atom(atom(&session, "p", &[y, z])),
        ]),
        Formula::Atom(atom(&session, "p", &[x, z])),
    );
    let grd = Grd::new(vec![trans], DependencyMode::Predicate, &session);
    assert!(stratify(&grd, StratificationStrategy::SingleEvaluation, &session).is_err());
    // Minimal-evaluation tolerates the cyclic component.
    let strata =
        stratify(&grd, StratificationStrategy::MinimalEvaluation, &session).unwrap();
    assert_eq!(strata.len(), 1);
}

#[test]
fn minimal_evaluation_groups_independent_components() {
    let session = Session::new();
    let x = v(&session, "X");
    let r1 = Rule::new(
        Formula::Atom(atom(&session, "a", &[x])),
        Formula::Atom(atom(&session, "b", &[x])),
    );
    let r2 = Rule::new(
        Formula::Atom(atom(&session, "c", &[x])),
        Formula::Atom(atom(&session, "d", &[x])),
    );
    let r3 = Rule::new(
        Formula::Atom(atom(&session, "b", &[x])),
        Formula::Atom(atom(&session, "e", &[x])),
    );
    let grd = Grd::new(vec![r1, r2, r3], DependencyMode::Predicate, &session);
    let strata =
        stratify(&grd, StratificationStrategy::MinimalEvaluation, &session).unwrap();
    // r1 and r2 are independent and share level 0; r3 depends on r1.
    assert_eq!(strata.len(), 2);
    assert_eq!(strata[0].len(), 2);
    assert_eq!(strata[1].len(), 1);
}

#[test]
fn hybrid_stratification_matches_by_scc_on_simple_inputs() {
    let session = Session::new();
    let rules = negation_rules(&session);
    let strata = hybrid_predicate_unifier(&rules, &session).unwrap();
    assert_eq!(strata.len(), 2);
    assert_eq!(strata[0].rules()[0].label.as_deref(), Some("r2"));
}
