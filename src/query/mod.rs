//! First-order query evaluation.
//!
//! The registry prepares a query once (equality normalization,
//! function-term rewriting, per-connective decomposition, bound
//! estimates); execution then streams substitutions on demand.

pub mod containment;
pub mod function_rewrite;
pub mod prepare;

pub use containment::subsumes;
pub use prepare::{
    BoxedPrepared, EvaluatorRegistry, PrepareError, PreparedFOQuery, SubstitutionIter,
};

use crate::data::{DataContext, EvaluationError};
use crate::formula::FOQuery;
use crate::session::Session;
use crate::substitution::Substitution;
use crate::term::Term;

/// Everything that can go wrong between preparing and running a query.
#[derive(Debug)]
pub enum QueryError {
    Prepare(PrepareError),
    Evaluation(EvaluationError),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Prepare(e) => write!(f, "{e}"),
            QueryError::Evaluation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<PrepareError> for QueryError {
    fn from(e: PrepareError) -> Self {
        QueryError::Prepare(e)
    }
}

impl From<EvaluationError> for QueryError {
    fn from(e: EvaluationError) -> Self {
        QueryError::Evaluation(e)
    }
}

/// Convenience evaluator dispatching through the default registry.
#[derive(Default)]
pub struct GenericFOQueryEvaluator {
    registry: EvaluatorRegistry,
}

impl GenericFOQueryEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Evaluate a query and collect the resulting substitutions.
    pub fn evaluate(
        &self,
        query: &FOQuery,
        ctx: &DataContext<'_>,
        session: &Session,
    ) -> Result<Vec<Substitution>, QueryError> {
        let prepared = self.registry.prepare(query.clone(), ctx, session)?;
        let results: Vec<Substitution> = prepared.execute(Substitution::new())?.collect();
        Ok(results)
    }

    /// Evaluate a query and project each result onto the answer signature.
    pub fn answers(
        &self,
        query: &FOQuery,
        ctx: &DataContext<'_>,
        session: &Session,
    ) -> Result<Vec<Vec<Term>>, QueryError> {
        let substitutions = self.evaluate(query, ctx, session)?;
        Ok(substitutions
            .into_iter()
            .map(|sub| {
                query
                    .answer_variables
                    .iter()
                    .map(|&v| sub.apply_term(Term::Variable(v), session))
                    .collect()
            })
            .collect())
    }

    /// Whether the query has at least one answer.
    pub fn has_answer(
        &self,
        query: &FOQuery,
        ctx: &DataContext<'_>,
        session: &Session,
    ) -> Result<bool, QueryError> {
        let prepared = self.registry.prepare(query.clone(), ctx, session)?;
        let mut iter = prepared.execute(Substitution::new())?;
        Ok(iter.next().is_some())
    }
}
