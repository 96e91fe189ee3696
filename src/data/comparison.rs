//! The comparison data source.
//!
//! Backs the reserved comparison predicates (`<`, `<=`, `>`, `>=`, `!=`).
//! Both positions must be ground; when the comparison holds the source
//! yields a single empty tuple, otherwise nothing.

use crate::data::{AtomicPattern, BasicQuery, EvaluationError, ReadableData, TupleIter};
use crate::id::PredId;
use crate::session::{Session, COMPARISON_OPERATORS};
use crate::term::Term;

#[derive(Clone, Debug, Default)]
pub struct ComparisonSource;

impl ComparisonSource {
    pub fn new() -> Self {
        ComparisonSource
    }

    fn operator(&self, session: &Session, predicate: PredId) -> Option<&'static str> {
        if session.predicate_arity(predicate) != 2 {
            return None;
        }
        let name = session.predicate_name(predicate);
        COMPARISON_OPERATORS.iter().copied().find(|op| *op == name)
    }
}

impl ReadableData for ComparisonSource {
    fn name(&self) -> &str {
        "comparison"
    }

    fn predicates(&self) -> Vec<PredId> {
        // Comparison predicates are interned on demand.
        Vec::new()
    }

    fn has_predicate(&self, session: &Session, predicate: PredId) -> bool {
        self.operator(session, predicate).is_some()
    }

    fn pattern(&self, session: &Session, predicate: PredId) -> Option<AtomicPattern> {
        self.operator(session, predicate)?;
        Some(AtomicPattern::ground_at([0, 1]))
    }

    fn evaluate<'a>(
        &'a self,
        session: &'a Session,
        query: &BasicQuery,
    ) -> Result<TupleIter<'a>, EvaluationError> {
        let op = self
            .operator(session, query.predicate)
            .ok_or_else(|| EvaluationError::new(self.name(), "unknown comparison predicate"))?;
        let (left, right) = match (query.bound_term(0), query.bound_term(1)) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                return Err(EvaluationError::new(
                    self.name(),
                    "comparison requires both positions bound",
                ))
            }
        };
        if compare(op, left, right, session) {
            Ok(Box::new(std::iter::once(Vec::new())))
        } else {
            Ok(Box::new(std::iter::empty()))
        }
    }

    fn estimate_bound(&self, session: &Session, query: &BasicQuery) -> Option<usize> {
        self.can_evaluate(session, query).then_some(1)
    }
}

/// Evaluate a comparison between two ground terms.
///
/// Numeric literals compare numerically across integer/float; other
/// literals compare within their own kind; constants compare by name.
/// Incomparable operands fail every ordering operator and satisfy `!=`
/// exactly when the terms differ.
pub fn compare(op: &str, left: Term, right: Term, session: &Session) -> bool {
    use std::cmp::Ordering;

    let ordering: Option<Ordering> = match (left, right) {
        (Term::Literal(a), Term::Literal(b)) => {
            let va = session.literal_value(a);
            let vb = session.literal_value(b);
            match (va.as_f64(), vb.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => {
                    if std::mem::discriminant(&va) == std::mem::discriminant(&vb) {
                        Some(va.cmp(&vb))
                    } else {
                        None
                    }
                }
            }
        }
        (Term::Constant(a), Term::Constant(b)) => {
            Some(session.constant_name(a).cmp(&session.constant_name(b)))
        }
        _ => None,
    };

    match (op, ordering) {
        ("!=", Some(ord)) => ord != std::cmp::Ordering::Equal,
        ("!=", None) => left != right,
        ("<", Some(ord)) => ord == std::cmp::Ordering::Less,
        ("<=", Some(ord)) => ord != std::cmp::Ordering::Greater,
        (">", Some(ord)) => ord == std::cmp::Ordering::Greater,
        (">=", Some(ord)) => ord != std::cmp::Ordering::Less,
        _ => false,
    }
}
