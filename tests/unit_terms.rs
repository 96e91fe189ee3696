//! Unit tests for interning, terms and literal values.

use datalex::term::{Term, Value};
use datalex::Session;

#[test]
fn interning_is_idempotent() {
    let session = Session::new();
    assert_eq!(session.constant("a"), session.constant("a"));
    assert_eq!(session.variable("X"), session.variable("X"));
    assert_eq!(session.int(42), session.int(42));
    assert_eq!(session.predicate("p", 2), session.predicate("p", 2));
}

#[test]
fn distinct_values_get_distinct_handles() {
    let session = Session::new();
    assert_ne!(session.constant("a"), session.constant("b"));
    assert_ne!(session.variable("X"), session.variable("Y"));
    assert_ne!(session.int(1), session.int(2));
    // Same name, different arity: different predicates.
    assert_ne!(session.predicate("p", 1), session.predicate("p", 2));
    // Constants and variables of the same name never collide.
    assert_ne!(session.constant("x"), session.variable("x"));
}

#[test]
fn fresh_variables_are_never_shared() {
    let session = Session::new();
    let a = session.fresh_variable("X");
    let b = session.fresh_variable("X");
    assert_ne!(a, b);
    // A fresh variable is not reachable by name lookup.
    assert_ne!(session.variable("X"), a);
}

#[test]
fn fresh_blanks_are_marked() {
    let session = Session::new();
    let blank = session.fresh_blank("E");
    assert!(session.is_blank(blank));
    assert!(!session.is_blank(session.constant("a")));
    assert!(session.is_ground(blank));
}

#[test]
fn function_terms_intern_structurally() {
    let session = Session::new();
    let a = session.constant("a");
    let f1 = session.logical_function_term("f", vec![a]);
    let f2 = session.logical_function_term("f", vec![a]);
    assert_eq!(f1, f2);
    let g = session.logical_function_term("g", vec![a]);
    assert_ne!(f1, g);
    // Evaluable and logical terms with the same shape stay distinct.
    let fe = session.evaluable_function_term("f", vec![a]);
    assert_ne!(f1, fe);
}

#[test]
fn groundness_sees_through_function_terms() {
    let session = Session::new();
    let a = session.constant("a");
    let x = session.variable("X");
    assert!(session.is_ground(session.logical_function_term("f", vec![a])));
    assert!(!session.is_ground(session.logical_function_term("f", vec![a, x])));
    assert!(!session.is_ground(x));
    assert!(session.is_ground(a));
}

#[test]
fn collection_literals_compare_structurally() {
    let session = Session::new();
    let t1 = Value::Tuple(vec![Value::Integer(1), Value::String("a".into())]);
    let t2 = Value::Tuple(vec![Value::Integer(1), Value::String("a".into())]);
    assert_eq!(session.literal(t1), session.literal(t2));

    let s1 = Value::Set([Value::Integer(2), Value::Integer(1)].into_iter().collect());
    let s2 = Value::Set([Value::Integer(1), Value::Integer(2)].into_iter().collect());
    assert_eq!(session.literal(s1), session.literal(s2));
}

#[test]
fn float_values_are_hashable_and_ordered() {
    let a = Value::Float(1.5);
    let b = Value::Float(1.5);
    assert_eq!(a, b);
    assert!(Value::Float(1.0) < Value::Float(2.0));
    assert!(Value::Integer(1) < Value::Float(1.5));
    assert_ne!(Value::Integer(2), Value::Float(2.0));
}

#[test]
fn term_display_goes_through_the_session() {
    let session = Session::new();
    let x = session.variable("X");
    let a = session.constant("a");
    let f = session.logical_function_term("f", vec![a, x]);
    assert_eq!(session.display_term(f), "f(a, X)");
    assert!(matches!(f, Term::Function(_)));
}
