//! Terms and literal values.
//!
//! A [`Term`] is a tagged id: the payload (variable name, constant name,
//! literal value, function symbol and arguments) lives in the session
//! interner, so terms are `Copy` and equality is id equality. Atoms store
//! their arguments as flat sequences of terms, never as pointer graphs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use crate::id::{ConstId, FnTermId, LitId, VarId};

/// An interned term.
///
/// Function terms (logical and evaluable) are themselves interned: the
/// `Function` variant points into the session's function-term arena, which
/// records the symbol, the argument terms and whether the symbol is bound to
/// a computed function.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Term {
    Variable(VarId),
    Constant(ConstId),
    Literal(LitId),
    Function(FnTermId),
}

impl Term {
    /// True for variables.
    #[inline]
    pub fn is_variable(self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// The variable id, if this term is a variable.
    #[inline]
    pub fn as_variable(self) -> Option<VarId> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// True for constants and literals. Function terms must be resolved
    /// through the session, which caches their groundness.
    #[inline]
    pub fn is_atomic_ground(self) -> bool {
        matches!(self, Term::Constant(_) | Term::Literal(_))
    }
}

/// A typed literal value.
///
/// Collection values (tuples, sets, dicts) carry their contents and compare
/// structurally. Floats are ordered and hashed through their IEEE total
/// order so that `Value` can live in sets and map keys.
#[derive(Clone, Debug)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Iri(String),
    Tuple(Vec<Value>),
    Set(BTreeSet<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Numeric view of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Discriminant rank used to order values of different kinds.
    fn rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Iri(_) => 4,
            Value::Tuple(_) => 5,
            Value::Set(_) => 6,
            Value::Dict(_) => 7,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Iri(a), Value::Iri(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Iri(s) => s.hash(state),
            Value::Tuple(xs) => xs.hash(state),
            Value::Set(xs) => xs.hash(state),
            Value::Dict(xs) => xs.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Mixed numerics order by numeric value, ties by rank
            (Value::Integer(a), Value::Float(b)) => (*a as f64)
                .total_cmp(b)
                .then(self.rank().cmp(&other.rank())),
            (Value::Float(a), Value::Integer(b)) => a
                .total_cmp(&(*b as f64))
                .then(self.rank().cmp(&other.rank())),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Iri(a), Value::Iri(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Dict(a), Value::Dict(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Iri(s) => write!(f, "<{s}>"),
            Value::Tuple(xs) => {
                write!(f, "(")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, ")")
            }
            Value::Set(xs) => {
                write!(f, "{{")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "}}")
            }
            Value::Dict(xs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
