//! Unit tests for the computed-function source.

use datalex::data::computed::ComputedFunctionSource;
use datalex::data::{BasicQuery, ReadableData};
use datalex::id::VarId;
use datalex::term::{Term, Value};
use datalex::Session;

fn result_var(session: &Session) -> VarId {
    match session.variable("R") {
        Term::Variable(v) => v,
        _ => unreachable!(),
    }
}

fn eval_one(
    source: &ComputedFunctionSource,
    session: &Session,
    function: &str,
    inputs: &[Term],
) -> Option<Term> {
    let predicate = session.function_predicate(function, inputs.len());
    let mut query = BasicQuery::new(predicate);
    for (pos, &term) in inputs.iter().enumerate() {
        query = query.bind(pos, term);
    }
    query = query.answer(inputs.len(), result_var(session));
    let mut tuples = source.evaluate(session, &query).ok()?;
    tuples.next().map(|t| t[0])
}

#[test]
fn forward_arithmetic() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let one = session.int(1);
    let two = session.int(2);
    let six = session.int(6);

    assert_eq!(eval_one(&source, &session, "sum", &[one, two]), Some(session.int(3)));
    assert_eq!(eval_one(&source, &session, "minus", &[six, two]), Some(session.int(4)));
    assert_eq!(eval_one(&source, &session, "product", &[two, six]), Some(session.int(12)));
    assert_eq!(
        eval_one(&source, &session, "divide", &[six, two]),
        Some(session.literal(Value::Float(3.0)))
    );
    assert_eq!(
        eval_one(&source, &session, "average", &[two, six]),
        Some(session.literal(Value::Float(4.0)))
    );
    assert_eq!(eval_one(&source, &session, "max", &[one, six, two]), Some(six));
    assert_eq!(eval_one(&source, &session, "min", &[six, one, two]), Some(one));
    assert_eq!(
        eval_one(&source, &session, "median", &[one, two, six]),
        Some(session.literal(Value::Float(2.0)))
    );
    assert_eq!(eval_one(&source, &session, "power", &[two, session.int(3)]), Some(session.int(8)));
}

#[test]
fn result_position_checks_when_bound() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let predicate = session.function_predicate("sum", 2);

    let check = |result: i64| {
        let query = BasicQuery::new(predicate)
            .bind(0, session.int(1))
            .bind(1, session.int(2))
            .bind(2, session.int(result));
        source.evaluate(&session, &query).unwrap().count()
    };
    assert_eq!(check(3), 1);
    assert_eq!(check(4), 0);
}

/// Each reversible function, solved for one missing input, re-evaluates
/// forward to the original tuple.
#[test]
fn reversible_solvers_round_trip() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();

    let cases: &[(&str, [i64; 2], i64)] = &[
        ("sum", [7, 5], 12),
        ("minus", [7, 5], 2),
        ("product", [7, 5], 35),
        ("average", [7, 5], 6),
    ];
    for &(function, [first, second], result) in cases {
        let predicate = session.function_predicate(function, 2);
        // Leave the second input unbound; the solver must recover it.
        let query = BasicQuery::new(predicate)
            .bind(0, session.int(first))
            .bind(2, session.int(result))
            .answer(1, result_var(&session));
        let tuples: Vec<Vec<Term>> =
            source.evaluate(&session, &query).unwrap().collect();
        assert_eq!(tuples.len(), 1, "{function} solver");
        assert_eq!(tuples[0][0], session.int(second), "{function} solver");

        // Forward again with the recovered value.
        assert_eq!(
            eval_one(&source, &session, function, &[session.int(first), tuples[0][0]])
                .map(|t| to_i64(&session, t)),
            Some(result),
            "{function} forward check"
        );
    }

    // divide(a, b, r): solve for the divisor.
    let predicate = session.function_predicate("divide", 2);
    let query = BasicQuery::new(predicate)
        .bind(0, session.int(12))
        .bind(2, session.literal(Value::Float(3.0)))
        .answer(1, result_var(&session));
    let tuples: Vec<Vec<Term>> = source.evaluate(&session, &query).unwrap().collect();
    assert_eq!(tuples.len(), 1);
    assert_eq!(to_i64(&session, tuples[0][0]), 4);
}

fn to_i64(session: &Session, term: Term) -> i64 {
    match term {
        Term::Literal(id) => match session.literal_value(id) {
            Value::Integer(i) => i,
            Value::Float(f) => f as i64,
            other => panic!("not numeric: {other}"),
        },
        _ => panic!("not a literal"),
    }
}

#[test]
fn two_unbound_positions_are_not_evaluable() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let predicate = session.function_predicate("sum", 2);
    let query = BasicQuery::new(predicate).bind(2, session.int(3));
    assert!(!source.can_evaluate(&session, &query));
    assert!(source.evaluate(&session, &query).is_err());
    assert_eq!(source.estimate_bound(&session, &query), None);
}

#[test]
fn division_by_zero_yields_empty_not_error() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    assert_eq!(
        eval_one(&source, &session, "divide", &[session.int(1), session.int(0)]),
        None
    );
}

#[test]
fn non_numeric_operands_yield_empty() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let s = session.literal(Value::String("oops".into()));
    assert_eq!(eval_one(&source, &session, "sum", &[s, session.int(1)]), None);
    // Constants are not literals; arithmetic over them is empty too.
    let c = session.constant("a");
    assert_eq!(eval_one(&source, &session, "sum", &[c, session.int(1)]), None);
}

#[test]
fn string_functions() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let hello = session.literal(Value::String("Hello".into()));
    let world = session.literal(Value::String("World".into()));

    assert_eq!(
        eval_one(&source, &session, "concat", &[hello, world]),
        Some(session.literal(Value::String("HelloWorld".into())))
    );
    assert_eq!(
        eval_one(&source, &session, "to_upper", &[hello]),
        Some(session.literal(Value::String("HELLO".into())))
    );
    assert_eq!(
        eval_one(&source, &session, "to_lower", &[hello]),
        Some(session.literal(Value::String("hello".into())))
    );
    assert_eq!(
        eval_one(&source, &session, "length", &[hello]),
        Some(session.int(5))
    );
    let l = session.literal(Value::String("l".into()));
    let w = session.literal(Value::String("w".into()));
    assert_eq!(
        eval_one(&source, &session, "replace", &[hello, l, w]),
        Some(session.literal(Value::String("Hewwo".into())))
    );
}

#[test]
fn collection_and_dict_functions() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let one = session.int(1);
    let two = session.int(2);

    let set12 = eval_one(&source, &session, "set_builder", &[one, two]).unwrap();
    let set1 = eval_one(&source, &session, "set_builder", &[one]).unwrap();
    assert_eq!(
        eval_one(&source, &session, "size", &[set12]),
        Some(session.int(2))
    );
    assert_eq!(
        eval_one(&source, &session, "is_subset", &[set1, set12]),
        Some(session.literal(Value::Boolean(true)))
    );
    assert_eq!(
        eval_one(&source, &session, "is_strict_subset", &[set12, set12]),
        Some(session.literal(Value::Boolean(false)))
    );
    assert_eq!(
        eval_one(&source, &session, "union", &[set1, set12]),
        Some(set12)
    );
    assert_eq!(
        eval_one(&source, &session, "intersection", &[set1, set12]),
        Some(set1)
    );
    assert_eq!(
        eval_one(&source, &session, "contains", &[set12, two]),
        Some(session.literal(Value::Boolean(true)))
    );

    let key = session.literal(Value::String("k".into()));
    let dict = eval_one(&source, &session, "dict_builder", &[key, one]).unwrap();
    assert_eq!(eval_one(&source, &session, "get_value", &[dict, key]), Some(one));
    assert_eq!(
        eval_one(&source, &session, "contains_key", &[dict, key]),
        Some(session.literal(Value::Boolean(true)))
    );
    assert_eq!(
        eval_one(&source, &session, "contains_value", &[dict, two]),
        Some(session.literal(Value::Boolean(false)))
    );
}

#[test]
fn conversions() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let text = session.literal(Value::String("42".into()));
    assert_eq!(eval_one(&source, &session, "to_int", &[text]), Some(session.int(42)));
    assert_eq!(
        eval_one(&source, &session, "to_float", &[session.int(2)]),
        Some(session.literal(Value::Float(2.0)))
    );
    assert_eq!(
        eval_one(&source, &session, "to_string", &[session.int(7)]),
        Some(session.literal(Value::String("7".into())))
    );
    let yes = session.literal(Value::String("true".into()));
    assert_eq!(
        eval_one(&source, &session, "to_boolean", &[yes]),
        Some(session.literal(Value::Boolean(true)))
    );
    // A malformed conversion is absorbed into emptiness.
    let bad = session.literal(Value::String("seven".into()));
    assert_eq!(eval_one(&source, &session, "to_int", &[bad]), None);
}

#[test]
fn aggregates_accept_a_single_collection_operand() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    let tuple = session.literal(Value::Tuple(vec![
        Value::Integer(1),
        Value::Integer(2),
        Value::Integer(3),
    ]));
    assert_eq!(eval_one(&source, &session, "sum", &[tuple]), Some(session.int(6)));
}

#[test]
fn predicate_namespace_is_respected() {
    let session = Session::new();
    let source = ComputedFunctionSource::standard();
    // Plain predicates never resolve as functions.
    let plain = session.predicate("sum", 3);
    assert!(!source.has_predicate(&session, plain));
    let unknown = session.function_predicate("frobnicate", 2);
    assert!(!source.has_predicate(&session, unknown));
    let known = session.function_predicate("sum", 2);
    assert!(source.has_predicate(&session, known));
}
