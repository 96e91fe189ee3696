//! Unit tests for the chase.

use std::sync::Arc;

use parking_lot::Mutex;

use datalex::atom::Atom;
use datalex::chase::{
    AddCreatedFactsTreatment, AlwaysTrueChecker, AtomLimit, BodySkolemRenamer,
    BreadthFirstApplier, ByPredicateScheduler, ChasableData, Chase, ComputeCoreTreatment,
    ExternalInterruption, FreshRenamer, FrontierSkolemRenamer, GrdScheduler, HaltReason,
    MultiThreadApplier, NaiveTriggerComputer, ObliviousChecker, ParallelApplier,
    PredicateFilterTreatment, RestrictedChecker, RestrictedTriggerComputer, RuleSplitTreatment,
    SemiNaiveTriggerComputer, SemiObliviousChecker, SimpleLineageTracker, StepLimit,
    TwoStepsTriggerComputer, WitnessKind,
};
use datalex::data::fact_base::InMemoryFactBase;
use datalex::data::WritableData;
use datalex::formula::Formula;
use datalex::grd::DependencyMode;
use datalex::kb::RuleBase;
use datalex::rule::Rule;
use datalex::term::Term;
use datalex::{CancelFlag, Session};

fn atom(session: &Session, name: &str, args: &[Term]) -> Atom {
    Atom::new(session.predicate(name, args.len()), args.to_vec())
}

fn v(session: &Session, name: &str) -> Term {
    session.variable(name)
}

/// S1 setup: p(a,b), p(b,c) under transitivity.
fn transitivity(session: &Session) -> (InMemoryFactBase, RuleBase) {
    let a = session.constant("a");
    let b = session.constant("b");
    let c = session.constant("c");
    let facts = InMemoryFactBase::from_atoms([
        atom(session, "p", &[a, b]),
        atom(session, "p", &[b, c]),
    ]);
    let (x, y, z) = (v(session, "X"), v(session, "Y"), v(session, "Z"));
    let rule = Rule::labeled(
        Formula::Conjunction(vec![
            Formula::Atom(atom(session, "p", &[x, y])),
            Formula::Atom(atom(session, "p", &[y, z])),
        ]),
        Formula::Atom(atom(session, "p", &[x, z])),
        "trans",
    );
    (facts, RuleBase::new([rule]))
}

#[test]
fn transitive_closure_saturates() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    let mut chase = Chase::builder()
        .rules(rules, &session)
        .trigger_checker(Box::<SemiObliviousChecker>::default())
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();

    assert_eq!(result.halt_reason, HaltReason::NoNewFacts);
    let a = session.constant("a");
    let b = session.constant("b");
    let c = session.constant("c");
    assert_eq!(facts.len(), 3);
    assert!(facts.contains(&atom(&session, "p", &[a, b])));
    assert!(facts.contains(&atom(&session, "p", &[b, c])));
    assert!(facts.contains(&atom(&session, "p", &[a, c])));
}

#[test]
fn trigger_computers_agree_on_the_closure() {
    let computers: Vec<fn() -> Box<dyn datalex::chase::TriggerComputer>> = vec![
        || Box::<NaiveTriggerComputer>::default(),
        || Box::<RestrictedTriggerComputer>::default(),
        || Box::<SemiNaiveTriggerComputer>::default(),
        || Box::<TwoStepsTriggerComputer>::default(),
    ];
    let mut sizes = Vec::new();
    for make in computers {
        let session = Session::new();
        let (mut facts, rules) = transitivity(&session);
        let mut chase = Chase::builder()
            .rules(rules, &session)
            .trigger_computer(make())
            .build();
        let mut data = ChasableData::new(&mut facts);
        chase.execute(&mut data, &session).unwrap();
        sizes.push(facts.len());
    }
    assert_eq!(sizes, vec![3, 3, 3, 3]);
}

#[test]
fn restricted_checker_blocks_redundant_existentials() {
    // manager(X) -> exists Y. supervises(Y, X); everybody already has a
    // supervisor, so nothing should fire.
    let session = Session::new();
    let a = session.constant("a");
    let s = session.constant("s");
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let mut facts = InMemoryFactBase::from_atoms([
        atom(&session, "manager", &[a]),
        atom(&session, "supervises", &[s, a]),
    ]);
    let rule = Rule::new(
        Formula::Atom(atom(&session, "manager", &[x])),
        Formula::Atom(atom(&session, "supervises", &[y, x])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .trigger_checker(Box::<RestrictedChecker>::default())
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();
    assert_eq!(result.created, 0);
    assert_eq!(facts.len(), 2);
}

#[test]
fn oblivious_checker_fires_where_restricted_does_not() {
    let session = Session::new();
    let a = session.constant("a");
    let s = session.constant("s");
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let mut facts = InMemoryFactBase::from_atoms([
        atom(&session, "manager", &[a]),
        atom(&session, "supervises", &[s, a]),
    ]);
    let rule = Rule::new(
        Formula::Atom(atom(&session, "manager", &[x])),
        Formula::Atom(atom(&session, "supervises", &[y, x])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .trigger_checker(Box::<ObliviousChecker>::default())
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();
    // One witness was invented even though a supervisor existed.
    assert_eq!(result.created, 1);
}

#[test]
fn always_checker_refires_treated_triggers() {
    // The oblivious checker fires a (rule, substitution) pair at most
    // once; the always checker re-fires it every step.
    let run = |always: bool| {
        let session = Session::new();
        let a = session.constant("a");
        let (x, y) = (v(&session, "X"), v(&session, "Y"));
        let mut facts = InMemoryFactBase::from_atoms([atom(&session, "manager", &[a])]);
        let rule = Rule::new(
            Formula::Atom(atom(&session, "manager", &[x])),
            Formula::Atom(atom(&session, "supervises", &[y, x])),
        );
        let checker: Box<dyn datalex::chase::TriggerChecker> = if always {
            Box::<AlwaysTrueChecker>::default()
        } else {
            Box::<ObliviousChecker>::default()
        };
        let mut chase = Chase::builder()
            .rules(RuleBase::new([rule]), &session)
            .trigger_checker(checker)
            .renamer(Box::new(FreshRenamer))
            .halting_condition(Box::new(StepLimit(3)))
            .build();
        let mut data = ChasableData::new(&mut facts);
        chase.execute(&mut data, &session).unwrap();
        facts.atoms_of(session.predicate("supervises", 2)).count()
    };
    // A fresh witness per step versus one witness ever.
    assert_eq!(run(true), 3);
    assert_eq!(run(false), 1);
}

#[test]
fn frontier_skolem_reuses_witnesses_across_equal_frontiers() {
    // Two body atoms with the same frontier image must share a witness.
    let session = Session::new();
    let a = session.constant("a");
    let (x, y, z) = (v(&session, "X"), v(&session, "Y"), v(&session, "Z"));
    let mut facts = InMemoryFactBase::from_atoms([
        atom(&session, "p", &[a, session.constant("b")]),
        atom(&session, "p", &[a, session.constant("c")]),
    ]);
    // p(X, Y) -> exists Z. w(X, Z): the frontier is X alone, so both
    // triggers share the witness.
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x, y])),
        Formula::Atom(atom(&session, "w", &[x, z])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .trigger_checker(Box::<ObliviousChecker>::default())
        .renamer(Box::new(FrontierSkolemRenamer::new(WitnessKind::Pseudo)))
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    let w = session.predicate("w", 2);
    assert_eq!(facts.atoms_of(w).count(), 1);
}

#[test]
fn body_skolem_distinguishes_different_bodies() {
    let session = Session::new();
    let a = session.constant("a");
    let (x, y, z) = (v(&session, "X"), v(&session, "Y"), v(&session, "Z"));
    let mut facts = InMemoryFactBase::from_atoms([
        atom(&session, "p", &[a, session.constant("b")]),
        atom(&session, "p", &[a, session.constant("c")]),
    ]);
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x, y])),
        Formula::Atom(atom(&session, "w", &[x, z])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .trigger_checker(Box::<ObliviousChecker>::default())
        .renamer(Box::new(BodySkolemRenamer::new(WitnessKind::Pseudo)))
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    let w = session.predicate("w", 2);
    // Different Y bindings give different body keys, hence two witnesses.
    assert_eq!(facts.atoms_of(w).count(), 2);
}

#[test]
fn true_skolem_witnesses_are_function_terms() {
    let session = Session::new();
    let a = session.constant("a");
    let (x, z) = (v(&session, "X"), v(&session, "Z"));
    let mut facts = InMemoryFactBase::from_atoms([atom(&session, "q", &[a])]);
    let rule = Rule::new(
        Formula::Atom(atom(&session, "q", &[x])),
        Formula::Atom(atom(&session, "w", &[x, z])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .renamer(Box::new(FrontierSkolemRenamer::new(WitnessKind::True)))
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    let w = session.predicate("w", 2);
    let created: Vec<&Atom> = facts.atoms_of(w).collect();
    assert_eq!(created.len(), 1);
    assert!(matches!(created[0].args[1], Term::Function(_)));
}

#[test]
fn fresh_renamer_never_converges_alone() {
    // With brand-new witnesses and an oblivious checker the rule refires
    // on its own output; the step limit reins it in.
    let session = Session::new();
    let a = session.constant("a");
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let mut facts = InMemoryFactBase::from_atoms([atom(&session, "p", &[a])]);
    let rule = Rule::new(
        Formula::Atom(atom(&session, "p", &[x])),
        Formula::Atom(atom(&session, "p", &[y])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .trigger_checker(Box::<ObliviousChecker>::default())
        .renamer(Box::new(FreshRenamer))
        .halting_condition(Box::new(StepLimit(4)))
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();
    assert_eq!(result.halt_reason, HaltReason::StepLimit(4));
    assert!(facts.len() > 1);
}

#[test]
fn atom_limit_halts_the_chase() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    facts.add(atom(
        &session,
        "p",
        &[session.constant("c"), session.constant("d")],
    ));
    let mut chase = Chase::builder()
        .rules(rules, &session)
        .halting_condition(Box::new(AtomLimit(3)))
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();
    assert_eq!(result.halt_reason, HaltReason::AtomLimit(3));
}

#[test]
fn external_interruption_halts_before_any_step() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    let flag = CancelFlag::new();
    flag.cancel();
    let mut chase = Chase::builder()
        .rules(rules, &session)
        .halting_condition(Box::new(ExternalInterruption(flag)))
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();
    assert_eq!(result.halt_reason, HaltReason::Interrupted);
    assert_eq!(result.steps, 0);
    assert_eq!(facts.len(), 2);
}

#[test]
fn schedulers_reach_the_same_fixpoint() {
    let run = |scheduler: Box<dyn datalex::chase::RuleScheduler>| {
        let session = Session::new();
        let (mut facts, rules) = transitivity(&session);
        let mut chase = Chase::builder()
            .rules(rules, &session)
            .scheduler(scheduler)
            .build();
        let mut data = ChasableData::new(&mut facts);
        chase.execute(&mut data, &session).unwrap();
        facts.len()
    };
    assert_eq!(run(Box::<ByPredicateScheduler>::default()), 3);
    assert_eq!(run(Box::new(GrdScheduler::new(DependencyMode::Predicate))), 3);
}

#[test]
fn appliers_produce_the_same_set() {
    let run = |applier: Option<Box<dyn datalex::chase::RuleApplier>>| {
        let session = Session::new();
        let (mut facts, rules) = transitivity(&session);
        let mut builder = Chase::builder().rules(rules, &session);
        if let Some(applier) = applier {
            builder = builder.applier(applier);
        }
        let mut chase = builder.build();
        let mut data = ChasableData::new(&mut facts);
        chase.execute(&mut data, &session).unwrap();
        let mut atoms: Vec<String> = facts.iter().map(|a| a.display(&session)).collect();
        atoms.sort();
        atoms
    };

    let breadth = run(None);
    let parallel = run(Some(Box::new(ParallelApplier::new(
        Box::<NaiveTriggerComputer>::default(),
        Box::<SemiObliviousChecker>::default(),
        Box::new(FrontierSkolemRenamer::new(WitnessKind::Pseudo)),
    ))));
    let threaded = run(Some(Box::new(MultiThreadApplier::new(
        Box::<NaiveTriggerComputer>::default(),
        Box::<SemiObliviousChecker>::default(),
        Box::new(FrontierSkolemRenamer::new(WitnessKind::Pseudo)),
        4,
    ))));
    assert_eq!(breadth, parallel);
    assert_eq!(breadth, threaded);
}

#[test]
fn lineage_records_creating_triggers() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    let mut chase = Chase::builder()
        .rules(rules, &session)
        .lineage(Box::<SimpleLineageTracker>::default())
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();

    let a = session.constant("a");
    let c = session.constant("c");
    let derived = atom(&session, "p", &[a, c]);
    let entry = chase.lineage().lineage_of(&derived).expect("tracked");
    assert_eq!(entry.rule_index, 0);
}

#[test]
fn rule_split_treatment_splits_independent_pieces() {
    let session = Session::new();
    let a = session.constant("a");
    let (x, y, z) = (v(&session, "X"), v(&session, "Y"), v(&session, "Z"));
    let mut facts = InMemoryFactBase::from_atoms([atom(&session, "q", &[a])]);
    // Head pieces w(X,Y) and u(X,Z) share no existential: splittable.
    let rule = Rule::new(
        Formula::Atom(atom(&session, "q", &[x])),
        Formula::Conjunction(vec![
            Formula::Atom(atom(&session, "w", &[x, y])),
            Formula::Atom(atom(&session, "u", &[x, z])),
        ]),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .global_pretreatment(Box::<RuleSplitTreatment>::default())
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    assert_eq!(facts.atoms_of(session.predicate("w", 2)).count(), 1);
    assert_eq!(facts.atoms_of(session.predicate("u", 2)).count(), 1);
}

#[test]
fn predicate_filter_keeps_only_requested_predicates() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    let p = session.predicate("p", 2);
    // Mark every left endpoint, then filter the markers out at the end.
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    let marker = Rule::new(
        Formula::Atom(atom(&session, "p", &[x, y])),
        Formula::Atom(atom(&session, "left", &[x])),
    );
    let mut base = rules;
    base.push(marker);
    let mut chase = Chase::builder()
        .rules(base, &session)
        .global_end_treatment(Box::new(PredicateFilterTreatment::new([p])))
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    assert!(facts.iter().all(|a| a.predicate == p));
    assert_eq!(facts.len(), 3);
}

#[test]
fn add_created_facts_treatment_collects_new_atoms() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut chase = Chase::builder()
        .rules(rules, &session)
        .end_of_step_treatment(Box::new(AddCreatedFactsTreatment::new(sink.clone())))
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    let collected = sink.lock();
    assert_eq!(collected.len(), 1);
    let a = session.constant("a");
    let c = session.constant("c");
    assert_eq!(collected[0], atom(&session, "p", &[a, c]));
}

#[test]
fn core_treatment_folds_redundant_witnesses() {
    let session = Session::new();
    let a = session.constant("a");
    let s = session.constant("s");
    let (x, y) = (v(&session, "X"), v(&session, "Y"));
    // The oblivious run invents a witness although s supervises a; the
    // core folds the witness away.
    let mut facts = InMemoryFactBase::from_atoms([
        atom(&session, "manager", &[a]),
        atom(&session, "supervises", &[s, a]),
    ]);
    let rule = Rule::new(
        Formula::Atom(atom(&session, "manager", &[x])),
        Formula::Atom(atom(&session, "supervises", &[y, x])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .trigger_checker(Box::<ObliviousChecker>::default())
        .global_end_treatment(Box::<ComputeCoreTreatment>::default())
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    assert_eq!(facts.len(), 2);
    assert!(facts.contains(&atom(&session, "supervises", &[s, a])));
}

#[test]
fn negated_bodies_follow_stratified_semantics_within_a_stratum() {
    let session = Session::new();
    let a = session.constant("a");
    let b = session.constant("b");
    let x = v(&session, "X");
    let mut facts = InMemoryFactBase::from_atoms([
        atom(&session, "person", &[a]),
        atom(&session, "person", &[b]),
        atom(&session, "bad", &[b]),
    ]);
    let rule = Rule::new(
        Formula::Conjunction(vec![
            Formula::Atom(atom(&session, "person", &[x])),
            Formula::Negation(Box::new(Formula::Atom(atom(&session, "bad", &[x])))),
        ]),
        Formula::Atom(atom(&session, "good", &[x])),
    );
    let mut chase = Chase::builder()
        .rules(RuleBase::new([rule]), &session)
        .build();
    let mut data = ChasableData::new(&mut facts);
    chase.execute(&mut data, &session).unwrap();
    assert!(facts.contains(&atom(&session, "good", &[a])));
    assert!(!facts.contains(&atom(&session, "good", &[b])));
}

#[test]
fn breadth_first_applier_can_be_built_explicitly() {
    let session = Session::new();
    let (mut facts, rules) = transitivity(&session);
    let applier = BreadthFirstApplier::new(
        Box::<NaiveTriggerComputer>::default(),
        Box::<SemiObliviousChecker>::default(),
        Box::new(FrontierSkolemRenamer::new(WitnessKind::Pseudo)),
    );
    let mut chase = Chase::builder()
        .rules(rules, &session)
        .applier(Box::new(applier))
        .build();
    let mut data = ChasableData::new(&mut facts);
    let result = chase.execute(&mut data, &session).unwrap();
    assert_eq!(result.halt_reason, HaltReason::NoNewFacts);
    assert_eq!(facts.len(), 3);
}
