//! The computed-predicate source.
//!
//! Exposes the built-in function library as a [`ReadableData`] over the
//! reserved `__func__` namespace. A function of n inputs is queried through
//! the predicate `__func__<name>` of arity n+1; the last position holds the
//! result.
//!
//! Forward functions need every input ground; the result position may be
//! unbound (compute) or bound (check). The arithmetic family (`sum`,
//! `minus`, `product`, `divide`, `average`) is reversible: with exactly one
//! unbound position anywhere, a solver computes the missing value. Solver
//! failures (division by zero, wrong operand type) yield empty results and
//! never abort the query.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::{AtomicPattern, BasicQuery, EvaluationError, ReadableData, TupleIter};
use crate::id::PredId;
use crate::session::{Session, FUNC_PREFIX};
use crate::term::{Term, Value};

/// A computed-function failure; absorbed into an empty result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FunctionError {
    DivisionByZero,
    InvalidInput(String),
    Overflow,
}

impl std::fmt::Display for FunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionError::DivisionByZero => write!(f, "division by zero"),
            FunctionError::InvalidInput(s) => write!(f, "invalid input: {s}"),
            FunctionError::Overflow => write!(f, "arithmetic overflow"),
        }
    }
}

impl std::error::Error for FunctionError {}

type FnResult = Result<Value, FunctionError>;

/// The reversible arithmetic functions.
const REVERSIBLE: [&str; 5] = ["sum", "minus", "product", "divide", "average"];

/// The built-in function source, optionally namespaced by a computed
/// prefix (`@computed prefix ig: ...` makes both `sum` and `ig:sum`
/// resolve).
#[derive(Clone, Debug, Default)]
pub struct ComputedFunctionSource {
    prefix: Option<String>,
}

impl ComputedFunctionSource {
    /// The standard library without a prefix binding.
    pub fn standard() -> Self {
        ComputedFunctionSource { prefix: None }
    }

    /// The standard library bound to a computed prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        ComputedFunctionSource {
            prefix: Some(prefix.into()),
        }
    }

    /// Resolve a predicate of the `__func__` namespace to a known function
    /// name and its input arity.
    fn resolve(&self, session: &Session, predicate: PredId) -> Option<(String, usize)> {
        let name = session.predicate_name(predicate);
        let stripped = name.strip_prefix(FUNC_PREFIX)?;
        let function = match &self.prefix {
            Some(p) => stripped
                .strip_prefix(p.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .unwrap_or(stripped),
            None => stripped,
        };
        let arity = session.predicate_arity(predicate);
        (arity > 0 && is_builtin(function)).then(|| (function.to_string(), arity - 1))
    }
}

impl ReadableData for ComputedFunctionSource {
    fn name(&self) -> &str {
        "computed-functions"
    }

    fn predicates(&self) -> Vec<PredId> {
        // The family is open: predicates are resolved by name on demand.
        Vec::new()
    }

    fn has_predicate(&self, session: &Session, predicate: PredId) -> bool {
        self.resolve(session, predicate).is_some()
    }

    fn pattern(&self, session: &Session, predicate: PredId) -> Option<AtomicPattern> {
        let (function, input_arity) = self.resolve(session, predicate)?;
        if REVERSIBLE.contains(&function.as_str()) {
            // Any n of the n+1 positions may be bound; expressed through
            // can_evaluate rather than mandatory positions.
            Some(AtomicPattern::unconstrained())
        } else {
            Some(AtomicPattern::ground_at(0..input_arity))
        }
    }

    fn can_evaluate(&self, session: &Session, query: &BasicQuery) -> bool {
        let Some((function, input_arity)) = self.resolve(session, query.predicate) else {
            return false;
        };
        let arity = input_arity + 1;
        let unbound = arity - query.bound.len();
        if REVERSIBLE.contains(&function.as_str()) {
            unbound <= 1
        } else {
            (0..input_arity).all(|pos| query.bound.contains_key(&pos))
        }
    }

    fn evaluate<'a>(
        &'a self,
        session: &'a Session,
        query: &BasicQuery,
    ) -> Result<TupleIter<'a>, EvaluationError> {
        let Some((function, input_arity)) = self.resolve(session, query.predicate) else {
            return Err(EvaluationError::new(self.name(), "unknown function predicate"));
        };
        if !self.can_evaluate(session, query) {
            return Err(EvaluationError::new(
                self.name(),
                format!("function {function} has too many unbound positions"),
            ));
        }

        let arity = input_arity + 1;
        let mut values: Vec<Option<Value>> = vec![None; arity];
        for (&pos, &term) in &query.bound {
            match term_value(term, session) {
                Some(v) => values[pos] = Some(v),
                // Non-literal operand: absorbed into an empty result.
                None => return Ok(Box::new(std::iter::empty())),
            }
        }

        let assignment = if values.iter().filter(|v| v.is_none()).count() == 1
            && REVERSIBLE.contains(&function.as_str())
            && values[arity - 1].is_some()
        {
            solve_reversible(&function, &values)
        } else {
            forward(&function, &values, input_arity)
        };

        let assignment = match assignment {
            Ok(a) => a,
            Err(err) => {
                log::debug!("computed function {function}: {err}");
                return Ok(Box::new(std::iter::empty()));
            }
        };

        // Bound positions act as checks against the computed assignment.
        for (&pos, &term) in &query.bound {
            let expected = term_value(term, session);
            if expected.as_ref() != Some(&assignment[pos]) {
                return Ok(Box::new(std::iter::empty()));
            }
        }

        let tuple: Vec<Term> = query
            .answer_positions()
            .into_iter()
            .map(|pos| session.literal(assignment[pos].clone()))
            .collect();
        Ok(Box::new(std::iter::once(tuple)))
    }

    fn estimate_bound(&self, session: &Session, query: &BasicQuery) -> Option<usize> {
        self.can_evaluate(session, query).then_some(1)
    }
}

fn term_value(term: Term, session: &Session) -> Option<Value> {
    match term {
        Term::Literal(id) => Some(session.literal_value(id)),
        _ => None,
    }
}

/// Forward evaluation: all inputs known, compute the result slot.
fn forward(
    function: &str,
    values: &[Option<Value>],
    input_arity: usize,
) -> Result<Vec<Value>, FunctionError> {
    let inputs: Vec<Value> = values[..input_arity]
        .iter()
        .map(|v| {
            v.clone()
                .ok_or_else(|| FunctionError::InvalidInput("unbound input".into()))
        })
        .collect::<Result<_, _>>()?;
    let result = apply_builtin(function, &inputs)?;
    let mut assignment: Vec<Value> = inputs;
    assignment.push(result);
    Ok(assignment)
}

/// One-missing solving for the reversible arithmetic family. The missing
/// position may be any input; the result is known.
fn solve_reversible(
    function: &str,
    values: &[Option<Value>],
) -> Result<Vec<Value>, FunctionError> {
    let arity = values.len();
    let missing = values
        .iter()
        .position(|v| v.is_none())
        .ok_or_else(|| FunctionError::InvalidInput("nothing to solve".into()))?;
    let numbers: Vec<Option<f64>> = values
        .iter()
        .map(|v| v.as_ref().and_then(Value::as_f64))
        .collect();
    for (i, n) in numbers.iter().enumerate() {
        if values[i].is_some() && n.is_none() {
            return Err(FunctionError::InvalidInput("non-numeric operand".into()));
        }
    }
    let known_ints = values
        .iter()
        .flatten()
        .all(|v| matches!(v, Value::Integer(_)));
    let result = numbers[arity - 1].expect("result bound");
    let known_inputs: Vec<f64> = numbers[..arity - 1].iter().flatten().copied().collect();
    let n_inputs = (arity - 1) as f64;

    let solved: f64 = match function {
        "sum" => result - known_inputs.iter().sum::<f64>(),
        "minus" => {
            // minus(a, b, ..., r) with r = a - b - ...
            if missing == 0 {
                result + known_inputs.iter().sum::<f64>()
            } else {
                let first = numbers[0].expect("first operand bound");
                let middle: f64 = numbers[1..arity - 1].iter().flatten().sum();
                first - middle - result
            }
        }
        "product" => {
            let others: f64 = known_inputs.iter().product();
            if others == 0.0 {
                return Err(FunctionError::DivisionByZero);
            }
            result / others
        }
        "divide" => {
            // divide(a, b, r) with r = a / b.
            if arity != 3 {
                return Err(FunctionError::InvalidInput(
                    "divide solves with exactly two operands".into(),
                ));
            }
            if missing == 0 {
                let b = numbers[1].expect("divisor bound");
                result * b
            } else {
                if result == 0.0 {
                    return Err(FunctionError::DivisionByZero);
                }
                let a = numbers[0].expect("dividend bound");
                a / result
            }
        }
        "average" => result * n_inputs - known_inputs.iter().sum::<f64>(),
        _ => {
            return Err(FunctionError::InvalidInput(format!(
                "function {function} is not reversible"
            )))
        }
    };

    if !solved.is_finite() {
        return Err(FunctionError::Overflow);
    }

    let mut assignment: Vec<Value> = Vec::with_capacity(arity);
    for (i, value) in values.iter().enumerate() {
        if i == missing {
            assignment.push(number_value(solved, known_ints));
        } else {
            assignment.push(value.clone().expect("bound position"));
        }
    }
    Ok(assignment)
}

fn number_value(x: f64, prefer_int: bool) -> Value {
    if prefer_int && x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        Value::Integer(x as i64)
    } else {
        Value::Float(x)
    }
}

fn is_builtin(name: &str) -> bool {
    const NAMES: &[&str] = &[
        "sum",
        "minus",
        "product",
        "divide",
        "average",
        "median",
        "min",
        "max",
        "power",
        "is_even",
        "is_odd",
        "is_prime",
        "is_greater",
        "is_greater_or_equal",
        "is_smaller",
        "is_smaller_or_equal",
        "lex_greater",
        "lex_greater_or_equal",
        "lex_smaller",
        "lex_smaller_or_equal",
        "equals",
        "concat",
        "to_lower",
        "to_upper",
        "replace",
        "length",
        "set_builder",
        "tuple_builder",
        "union",
        "intersection",
        "size",
        "contains",
        "is_subset",
        "is_strict_subset",
        "is_empty",
        "is_blank",
        "is_numeric",
        "to_string",
        "to_int",
        "to_float",
        "to_boolean",
        "to_set",
        "to_tuple",
        "dict_builder",
        "merge_dicts",
        "dict_keys",
        "dict_values",
        "get_value",
        "contains_key",
        "contains_value",
    ];
    NAMES.contains(&name)
}

/// Dispatch a builtin on literal values.
fn apply_builtin(name: &str, args: &[Value]) -> FnResult {
    match name {
        "sum" => fold_numeric(args, 0.0, |a, b| a + b),
        "minus" => {
            let xs = numeric_args(&aggregate_operands(args))?;
            if xs.is_empty() {
                return Err(FunctionError::InvalidInput("minus of nothing".into()));
            }
            let value = xs[1..].iter().fold(xs[0], |a, b| a - b);
            Ok(number_value(value, all_integers(args)))
        }
        "product" => fold_numeric(args, 1.0, |a, b| a * b),
        "divide" => {
            let xs = numeric_args(&aggregate_operands(args))?;
            if xs.is_empty() {
                return Err(FunctionError::InvalidInput("divide of nothing".into()));
            }
            if xs[1..].iter().any(|&x| x == 0.0) {
                return Err(FunctionError::DivisionByZero);
            }
            Ok(Value::Float(xs[1..].iter().fold(xs[0], |a, b| a / b)))
        }
        "average" => {
            let xs = numeric_args(&aggregate_operands(args))?;
            if xs.is_empty() {
                return Err(FunctionError::InvalidInput("average of nothing".into()));
            }
            Ok(Value::Float(xs.iter().sum::<f64>() / xs.len() as f64))
        }
        "median" => {
            let mut xs = numeric_args(&aggregate_operands(args))?;
            if xs.is_empty() {
                return Err(FunctionError::InvalidInput("median of nothing".into()));
            }
            xs.sort_by(f64::total_cmp);
            let mid = xs.len() / 2;
            let value = if xs.len() % 2 == 1 {
                xs[mid]
            } else {
                (xs[mid - 1] + xs[mid]) / 2.0
            };
            Ok(Value::Float(value))
        }
        "min" => {
            let xs = numeric_args(&aggregate_operands(args))?;
            xs.iter()
                .copied()
                .min_by(f64::total_cmp)
                .map(|x| number_value(x, all_integers(args)))
                .ok_or_else(|| FunctionError::InvalidInput("min of nothing".into()))
        }
        "max" => {
            let xs = numeric_args(&aggregate_operands(args))?;
            xs.iter()
                .copied()
                .max_by(f64::total_cmp)
                .map(|x| number_value(x, all_integers(args)))
                .ok_or_else(|| FunctionError::InvalidInput("max of nothing".into()))
        }
        "power" => {
            let xs = numeric_args(args)?;
            match xs[..] {
                [base, exponent] => {
                    let value = base.powf(exponent);
                    if value.is_finite() {
                        Ok(number_value(value, all_integers(args) && exponent >= 0.0))
                    } else {
                        Err(FunctionError::Overflow)
                    }
                }
                _ => Err(FunctionError::InvalidInput("power takes two operands".into())),
            }
        }
        "is_even" => numeric_unary(args).map(|x| Value::Boolean(x.rem_euclid(2.0) == 0.0)),
        "is_odd" => numeric_unary(args).map(|x| Value::Boolean(x.rem_euclid(2.0) == 1.0)),
        "is_prime" => {
            let x = numeric_unary(args)?;
            if x.fract() != 0.0 || x < 2.0 {
                return Ok(Value::Boolean(false));
            }
            let n = x as u64;
            let mut d = 2u64;
            let mut prime = true;
            while d * d <= n {
                if n % d == 0 {
                    prime = false;
                    break;
                }
                d += 1;
            }
            Ok(Value::Boolean(prime))
        }
        "is_greater" => numeric_pair(args).map(|(a, b)| Value::Boolean(a > b)),
        "is_greater_or_equal" => numeric_pair(args).map(|(a, b)| Value::Boolean(a >= b)),
        "is_smaller" => numeric_pair(args).map(|(a, b)| Value::Boolean(a < b)),
        "is_smaller_or_equal" => numeric_pair(args).map(|(a, b)| Value::Boolean(a <= b)),
        "lex_greater" => string_pair(args).map(|(a, b)| Value::Boolean(a > b)),
        "lex_greater_or_equal" => string_pair(args).map(|(a, b)| Value::Boolean(a >= b)),
        "lex_smaller" => string_pair(args).map(|(a, b)| Value::Boolean(a < b)),
        "lex_smaller_or_equal" => string_pair(args).map(|(a, b)| Value::Boolean(a <= b)),
        "equals" => match args {
            [a, b] => Ok(Value::Boolean(a == b)),
            _ => Err(FunctionError::InvalidInput("equals takes two operands".into())),
        },
        "concat" => {
            let mut out = String::new();
            for a in args {
                out.push_str(&string_arg(a)?);
            }
            Ok(Value::String(out))
        }
        "to_lower" => string_unary(args).map(|s| Value::String(s.to_lowercase())),
        "to_upper" => string_unary(args).map(|s| Value::String(s.to_uppercase())),
        "replace" => match args {
            [s, from, to] => Ok(Value::String(string_arg(s)?.replace(
                &string_arg(from)?,
                &string_arg(to)?,
            ))),
            _ => Err(FunctionError::InvalidInput("replace takes three operands".into())),
        },
        "length" => string_unary(args).map(|s| Value::Integer(s.chars().count() as i64)),
        "set_builder" => Ok(Value::Set(args.iter().cloned().collect())),
        "tuple_builder" => Ok(Value::Tuple(args.to_vec())),
        "union" => {
            let mut out: BTreeSet<Value> = BTreeSet::new();
            for a in args {
                out.extend(set_arg(a)?);
            }
            Ok(Value::Set(out))
        }
        "intersection" => {
            let mut sets = args.iter().map(set_arg);
            let mut out = sets
                .next()
                .ok_or_else(|| FunctionError::InvalidInput("intersection of nothing".into()))??;
            for s in sets {
                let s = s?;
                out.retain(|v| s.contains(v));
            }
            Ok(Value::Set(out))
        }
        "size" => match args {
            [Value::Set(s)] => Ok(Value::Integer(s.len() as i64)),
            [Value::Tuple(t)] => Ok(Value::Integer(t.len() as i64)),
            [Value::Dict(d)] => Ok(Value::Integer(d.len() as i64)),
            _ => Err(FunctionError::InvalidInput("size of a non-collection".into())),
        },
        "contains" => match args {
            [Value::Set(s), v] => Ok(Value::Boolean(s.contains(v))),
            [Value::Tuple(t), v] => Ok(Value::Boolean(t.contains(v))),
            _ => Err(FunctionError::InvalidInput("contains on a non-collection".into())),
        },
        "is_subset" => {
            let (a, b) = set_pair(args)?;
            Ok(Value::Boolean(a.is_subset(&b)))
        }
        "is_strict_subset" => {
            let (a, b) = set_pair(args)?;
            Ok(Value::Boolean(a.is_subset(&b) && a != b))
        }
        "is_empty" => match args {
            [Value::Set(s)] => Ok(Value::Boolean(s.is_empty())),
            [Value::Tuple(t)] => Ok(Value::Boolean(t.is_empty())),
            [Value::Dict(d)] => Ok(Value::Boolean(d.is_empty())),
            [Value::String(s)] => Ok(Value::Boolean(s.is_empty())),
            _ => Err(FunctionError::InvalidInput("is_empty on a non-collection".into())),
        },
        "is_blank" => string_unary(args).map(|s| Value::Boolean(s.trim().is_empty())),
        "is_numeric" => match args {
            [v] => Ok(Value::Boolean(v.as_f64().is_some())),
            _ => Err(FunctionError::InvalidInput("is_numeric takes one operand".into())),
        },
        "to_string" => match args {
            [Value::String(s)] => Ok(Value::String(s.clone())),
            [v] => Ok(Value::String(v.to_string())),
            _ => Err(FunctionError::InvalidInput("to_string takes one operand".into())),
        },
        "to_int" => match args {
            [Value::Integer(i)] => Ok(Value::Integer(*i)),
            [Value::Float(f)] => Ok(Value::Integer(*f as i64)),
            [Value::String(s)] => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| FunctionError::InvalidInput(format!("not an integer: {s}"))),
            [Value::Boolean(b)] => Ok(Value::Integer(i64::from(*b))),
            _ => Err(FunctionError::InvalidInput("to_int of a non-scalar".into())),
        },
        "to_float" => match args {
            [Value::Integer(i)] => Ok(Value::Float(*i as f64)),
            [Value::Float(f)] => Ok(Value::Float(*f)),
            [Value::String(s)] => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| FunctionError::InvalidInput(format!("not a float: {s}"))),
            _ => Err(FunctionError::InvalidInput("to_float of a non-scalar".into())),
        },
        "to_boolean" => match args {
            [Value::Boolean(b)] => Ok(Value::Boolean(*b)),
            [Value::String(s)] => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                other => Err(FunctionError::InvalidInput(format!("not a boolean: {other}"))),
            },
            [Value::Integer(i)] => Ok(Value::Boolean(*i != 0)),
            _ => Err(FunctionError::InvalidInput("to_boolean of a non-scalar".into())),
        },
        "to_set" => match args {
            [Value::Set(s)] => Ok(Value::Set(s.clone())),
            [Value::Tuple(t)] => Ok(Value::Set(t.iter().cloned().collect())),
            _ => Ok(Value::Set(args.iter().cloned().collect())),
        },
        "to_tuple" => match args {
            [Value::Tuple(t)] => Ok(Value::Tuple(t.clone())),
            [Value::Set(s)] => Ok(Value::Tuple(s.iter().cloned().collect())),
            _ => Ok(Value::Tuple(args.to_vec())),
        },
        "dict_builder" => {
            if args.len() % 2 != 0 {
                return Err(FunctionError::InvalidInput(
                    "dict_builder takes key/value pairs".into(),
                ));
            }
            let mut out: BTreeMap<String, Value> = BTreeMap::new();
            for pair in args.chunks(2) {
                out.insert(string_arg(&pair[0])?, pair[1].clone());
            }
            Ok(Value::Dict(out))
        }
        "merge_dicts" => {
            let mut out: BTreeMap<String, Value> = BTreeMap::new();
            for a in args {
                out.extend(dict_arg(a)?);
            }
            Ok(Value::Dict(out))
        }
        "dict_keys" => match args {
            [Value::Dict(d)] => Ok(Value::Tuple(
                d.keys().map(|k| Value::String(k.clone())).collect(),
            )),
            _ => Err(FunctionError::InvalidInput("dict_keys of a non-dict".into())),
        },
        "dict_values" => match args {
            [Value::Dict(d)] => Ok(Value::Tuple(d.values().cloned().collect())),
            _ => Err(FunctionError::InvalidInput("dict_values of a non-dict".into())),
        },
        "get_value" => match args {
            [Value::Dict(d), key] => d
                .get(&string_arg(key)?)
                .cloned()
                .ok_or_else(|| FunctionError::InvalidInput("missing dict key".into())),
            _ => Err(FunctionError::InvalidInput("get_value of a non-dict".into())),
        },
        "contains_key" => match args {
            [Value::Dict(d), key] => Ok(Value::Boolean(d.contains_key(&string_arg(key)?))),
            _ => Err(FunctionError::InvalidInput("contains_key of a non-dict".into())),
        },
        "contains_value" => match args {
            [Value::Dict(d), v] => Ok(Value::Boolean(d.values().any(|x| x == v))),
            _ => Err(FunctionError::InvalidInput("contains_value of a non-dict".into())),
        },
        other => Err(FunctionError::InvalidInput(format!("unknown function {other}"))),
    }
}

/// A single collection operand stands for its elements (so `sum` applies
/// to both `sum(1, 2, 3)` and `sum((1, 2, 3))`).
fn aggregate_operands(args: &[Value]) -> Vec<Value> {
    match args {
        [Value::Tuple(xs)] => xs.clone(),
        [Value::Set(xs)] => xs.iter().cloned().collect(),
        _ => args.to_vec(),
    }
}

fn all_integers(args: &[Value]) -> bool {
    aggregate_operands(args)
        .iter()
        .all(|v| matches!(v, Value::Integer(_)))
}

fn fold_numeric(args: &[Value], init: f64, op: fn(f64, f64) -> f64) -> FnResult {
    let xs = numeric_args(&aggregate_operands(args))?;
    let value = xs.into_iter().fold(init, op);
    if value.is_finite() {
        Ok(number_value(value, all_integers(args)))
    } else {
        Err(FunctionError::Overflow)
    }
}

fn numeric_args(args: &[Value]) -> Result<Vec<f64>, FunctionError> {
    args.iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| FunctionError::InvalidInput(format!("not a number: {v}")))
        })
        .collect()
}

fn numeric_unary(args: &[Value]) -> Result<f64, FunctionError> {
    match numeric_args(args)?[..] {
        [x] => Ok(x),
        _ => Err(FunctionError::InvalidInput("expected one numeric operand".into())),
    }
}

fn numeric_pair(args: &[Value]) -> Result<(f64, f64), FunctionError> {
    match numeric_args(args)?[..] {
        [a, b] => Ok((a, b)),
        _ => Err(FunctionError::InvalidInput("expected two numeric operands".into())),
    }
}

fn string_arg(v: &Value) -> Result<String, FunctionError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Iri(s) => Ok(s.clone()),
        _ => Err(FunctionError::InvalidInput(format!("not a string: {v}"))),
    }
}

fn string_unary(args: &[Value]) -> Result<String, FunctionError> {
    match args {
        [v] => string_arg(v),
        _ => Err(FunctionError::InvalidInput("expected one string operand".into())),
    }
}

fn string_pair(args: &[Value]) -> Result<(String, String), FunctionError> {
    match args {
        [a, b] => Ok((string_arg(a)?, string_arg(b)?)),
        _ => Err(FunctionError::InvalidInput("expected two string operands".into())),
    }
}

fn set_arg(v: &Value) -> Result<BTreeSet<Value>, FunctionError> {
    match v {
        Value::Set(s) => Ok(s.clone()),
        Value::Tuple(t) => Ok(t.iter().cloned().collect()),
        _ => Err(FunctionError::InvalidInput(format!("not a collection: {v}"))),
    }
}

fn set_pair(args: &[Value]) -> Result<(BTreeSet<Value>, BTreeSet<Value>), FunctionError> {
    match args {
        [a, b] => Ok((set_arg(a)?, set_arg(b)?)),
        _ => Err(FunctionError::InvalidInput("expected two collection operands".into())),
    }
}

fn dict_arg(v: &Value) -> Result<BTreeMap<String, Value>, FunctionError> {
    match v {
        Value::Dict(d) => Ok(d.clone()),
        _ => Err(FunctionError::InvalidInput(format!("not a dict: {v}"))),
    }
}
