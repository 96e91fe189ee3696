//! Prepared first-order queries.
//!
//! Preparation happens once per query: equality atoms are pulled out,
//! evaluable function terms are rewritten into computed atoms, the formula
//! is decomposed by connective into cached sub-prepared queries, and every
//! node gets a cheap bound estimate. Execution is lazy: each node yields
//! substitutions one at a time, driven by consumer pull.

use indexmap::IndexSet;
use itertools::Itertools;

use crate::atom::Atom;
use crate::data::{BasicQuery, DataContext, EvaluationError, ReadableData};
use crate::formula::{FOQuery, Formula, FormulaKind};
use crate::homomorphism::match_atom;
use crate::id::VarId;
use crate::partition::TermPartition;
use crate::query::function_rewrite::{expand_formula, formula_contains_evaluable};
use crate::session::{DiagnosticKind, Session};
use crate::substitution::Substitution;
use crate::term::Term;

/// A lazily yielded stream of substitutions.
pub type SubstitutionIter<'q> = Box<dyn Iterator<Item = Substitution> + 'q>;

/// Preparation failure.
#[derive(Clone, Debug)]
pub enum PrepareError {
    /// No evaluator is registered for the formula kind.
    Unsupported(FormulaKind),
}

impl std::fmt::Display for PrepareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrepareError::Unsupported(kind) => {
                write!(f, "no evaluator registered for {kind:?} formulas")
            }
        }
    }
}

impl std::error::Error for PrepareError {}

/// A prepared first-order query.
pub trait PreparedFOQuery<'a> {
    /// The query this node was prepared from.
    fn query(&self) -> &FOQuery;

    /// Execute under an assignment, yielding extended substitutions.
    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q;

    /// A cheap upper bound on the result count. `None` means unknown.
    fn estimate_bound(&self, assignment: &Substitution) -> Option<usize>;

    /// Whether the node can be evaluated under the assignment.
    fn is_evaluable_with(&self, assignment: &Substitution) -> bool;

    /// Variables that must be bound before execution.
    fn mandatory_parameters(&self) -> IndexSet<VarId> {
        IndexSet::new()
    }
}

pub type BoxedPrepared<'a> = Box<dyn PreparedFOQuery<'a> + 'a>;

/// Constructor signature registered per formula kind.
pub type PrepareFn =
    for<'a> fn(
        FOQuery,
        &DataContext<'a>,
        &'a Session,
        &'a EvaluatorRegistry,
    ) -> Result<BoxedPrepared<'a>, PrepareError>;

/// Maps formula kinds to evaluator constructors. The atomic evaluator is
/// the default for single-atom queries.
pub struct EvaluatorRegistry {
    constructors: indexmap::IndexMap<FormulaKind, PrepareFn>,
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        let mut registry = EvaluatorRegistry {
            constructors: indexmap::IndexMap::new(),
        };
        registry.register(FormulaKind::Atom, prepare_atom);
        registry.register(FormulaKind::Conjunction, prepare_conjunction);
        registry.register(FormulaKind::Disjunction, prepare_disjunction);
        registry.register(FormulaKind::Negation, prepare_negation);
        registry.register(FormulaKind::Existential, prepare_existential);
        registry.register(FormulaKind::Universal, prepare_universal);
        registry
    }
}

impl EvaluatorRegistry {
    /// Register (or override) the evaluator for a formula kind.
    pub fn register(&mut self, kind: FormulaKind, prepare: PrepareFn) {
        self.constructors.insert(kind, prepare);
    }

    /// Prepare a query against a data context.
    ///
    /// Evaluable function terms are rewritten first, through the shared
    /// helper, so every evaluator sees the same expanded formula.
    pub fn prepare<'a>(
        &'a self,
        query: FOQuery,
        ctx: &DataContext<'a>,
        session: &'a Session,
    ) -> Result<BoxedPrepared<'a>, PrepareError> {
        let query = if formula_contains_evaluable(&query.body, session) {
            FOQuery {
                answer_variables: query.answer_variables,
                body: expand_formula(&query.body, session),
            }
        } else {
            query
        };
        self.prepare_expanded(query, ctx, session)
    }

    fn prepare_expanded<'a>(
        &'a self,
        query: FOQuery,
        ctx: &DataContext<'a>,
        session: &'a Session,
    ) -> Result<BoxedPrepared<'a>, PrepareError> {
        let kind = query.body.kind();
        let prepare = self
            .constructors
            .get(&kind)
            .ok_or(PrepareError::Unsupported(kind))?;
        prepare(query, ctx, session, self)
    }
}

fn subquery_for(formula: &Formula, session: &Session) -> FOQuery {
    let mut vars: Vec<VarId> = formula.free_variables(session).into_iter().collect();
    vars.sort_unstable();
    FOQuery {
        answer_variables: vars,
        body: formula.clone(),
    }
}

// ----------------------------------------------------------------------
// Atomic queries
// ----------------------------------------------------------------------

struct PreparedAtom<'a> {
    session: &'a Session,
    source: Option<&'a dyn ReadableData>,
    query: FOQuery,
    atom: Atom,
    mandatory: IndexSet<VarId>,
}

fn prepare_atom<'a>(
    query: FOQuery,
    ctx: &DataContext<'a>,
    session: &'a Session,
    _registry: &'a EvaluatorRegistry,
) -> Result<BoxedPrepared<'a>, PrepareError> {
    let atom = match &query.body {
        Formula::Atom(atom) => atom.clone(),
        _ => return Err(PrepareError::Unsupported(query.body.kind())),
    };
    let source = ctx.route(session, atom.predicate);
    let mut mandatory = IndexSet::new();
    if let Some(source) = source {
        if let Some(pattern) = source.pattern(session, atom.predicate) {
            for &pos in &pattern.mandatory {
                if let Some(Term::Variable(v)) = atom.args.get(pos).copied() {
                    mandatory.insert(v);
                }
            }
        }
    }
    Ok(Box::new(PreparedAtom {
        session,
        source,
        query,
        atom,
        mandatory,
    }))
}

impl<'a> PreparedAtom<'a> {
    fn basic_query(&self, assignment: &Substitution) -> BasicQuery {
        let mut query = BasicQuery::new(self.atom.predicate);
        for (pos, &arg) in self.atom.args.iter().enumerate() {
            let applied = assignment.apply_term(arg, self.session);
            if self.session.is_ground(applied) {
                query = query.bind(pos, applied);
            } else if let Term::Variable(v) = applied {
                query = query.answer(pos, v);
            }
        }
        query
    }
}

impl<'a> PreparedFOQuery<'a> for PreparedAtom<'a> {
    fn query(&self) -> &FOQuery {
        &self.query
    }

    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q,
    {
        let source = match self.source {
            Some(source) => source,
            // A predicate unknown to every source has an empty extension.
            None => return Ok(Box::new(std::iter::empty())),
        };
        let query = self.basic_query(&assignment);
        if !source.can_evaluate(self.session, &query) {
            return Err(EvaluationError::new(
                source.name(),
                format!(
                    "cannot evaluate atom {}: mandatory positions unbound",
                    self.atom.display(self.session)
                ),
            ));
        }
        Ok(match_atom(&self.atom, source, &assignment, self.session))
    }

    fn estimate_bound(&self, assignment: &Substitution) -> Option<usize> {
        let source = match self.source {
            Some(source) => source,
            None => return Some(0),
        };
        let query = self.basic_query(assignment);
        if !source.can_evaluate(self.session, &query) {
            return Some(0);
        }
        source.estimate_bound(self.session, &query)
    }

    fn is_evaluable_with(&self, assignment: &Substitution) -> bool {
        match self.source {
            Some(source) => source.can_evaluate(self.session, &self.basic_query(assignment)),
            None => false,
        }
    }

    fn mandatory_parameters(&self) -> IndexSet<VarId> {
        self.mandatory.clone()
    }
}

// ----------------------------------------------------------------------
// Conjunctions
// ----------------------------------------------------------------------

struct PreparedConjunction<'a> {
    session: &'a Session,
    query: FOQuery,
    children: Vec<BoxedPrepared<'a>>,
    equality_atoms: Vec<Atom>,
}

fn prepare_conjunction<'a>(
    query: FOQuery,
    ctx: &DataContext<'a>,
    session: &'a Session,
    registry: &'a EvaluatorRegistry,
) -> Result<BoxedPrepared<'a>, PrepareError> {
    let equality = session.equality_predicate();
    let mut equality_atoms = Vec::new();
    let mut children = Vec::new();
    for part in query.body.flatten_conjunction() {
        match part {
            Formula::Atom(atom) if atom.predicate == equality => {
                equality_atoms.push(atom.clone());
            }
            other => {
                let sub_query = subquery_for(other, session);
                children.push(registry.prepare_expanded(sub_query, ctx, session)?);
            }
        }
    }
    Ok(Box::new(PreparedConjunction {
        session,
        query,
        children,
        equality_atoms,
    }))
}

impl<'a> PreparedConjunction<'a> {
    /// Pick the next child: smallest estimated bound among the evaluable
    /// ones, ties by insertion order. Falls back to the first child when
    /// nothing is evaluable (negation-as-failure paths).
    fn select_next(&self, remaining: &[usize], assignment: &Substitution) -> usize {
        let mut best: Option<(usize, usize)> = None; // (bound, slot)
        for (slot, &index) in remaining.iter().enumerate() {
            let child = &self.children[index];
            if !child.is_evaluable_with(assignment) {
                continue;
            }
            let bound = child.estimate_bound(assignment).unwrap_or(usize::MAX);
            if best.map_or(true, |b| (bound, slot) < b) {
                best = Some((bound, slot));
            }
        }
        best.map_or(0, |(_, slot)| slot)
    }

    fn backtrack<'q>(
        &'q self,
        assignment: Substitution,
        remaining: Vec<usize>,
    ) -> SubstitutionIter<'q> {
        if self.session.cancel_flag().is_cancelled() {
            return Box::new(std::iter::empty());
        }
        if remaining.is_empty() {
            return Box::new(std::iter::once(assignment.normalize()));
        }
        let slot = self.select_next(&remaining, &assignment);
        let mut rest = remaining;
        let index = rest.remove(slot);
        match self.children[index].execute(assignment) {
            Ok(results) => Box::new(
                results.flat_map(move |extended| self.backtrack(extended, rest.clone())),
            ),
            Err(err) => {
                log::warn!("{err}");
                Box::new(std::iter::empty())
            }
        }
    }
}

impl<'a> PreparedFOQuery<'a> for PreparedConjunction<'a> {
    fn query(&self) -> &FOQuery {
        &self.query
    }

    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q,
    {
        let mut assignment = assignment;

        if !self.equality_atoms.is_empty() {
            let mut partition = TermPartition::new();
            for atom in &self.equality_atoms {
                let left = assignment.apply_term(atom.args[0], self.session);
                let right = assignment.apply_term(atom.args[1], self.session);
                partition.union(left, right);
            }
            if !partition.is_admissible(self.session) {
                return Ok(Box::new(std::iter::empty()));
            }
            let empty = IndexSet::new();
            let equality_sub =
                match partition.associated_substitution(&empty, &empty, self.session) {
                    Some(sub) => sub,
                    None => return Ok(Box::new(std::iter::empty())),
                };
            assignment = assignment.compose(&equality_sub, self.session);
        }

        if self.children.is_empty() {
            return Ok(Box::new(std::iter::once(assignment.normalize())));
        }

        let order: Vec<usize> = (0..self.children.len()).collect();
        Ok(self.backtrack(assignment, order))
    }

    fn estimate_bound(&self, assignment: &Substitution) -> Option<usize> {
        // The scheduler needs a lower envelope only: the cheapest child
        // bounds the whole conjunction.
        let mut best: Option<usize> = None;
        for child in &self.children {
            match child.estimate_bound(assignment) {
                Some(0) => return Some(0),
                Some(bound) => best = Some(best.map_or(bound, |b: usize| b.min(bound))),
                None => {}
            }
        }
        best
    }

    fn is_evaluable_with(&self, assignment: &Substitution) -> bool {
        self.children.is_empty()
            || self
                .children
                .iter()
                .any(|c| c.is_evaluable_with(assignment))
    }
}

// ----------------------------------------------------------------------
// Disjunctions
// ----------------------------------------------------------------------

struct PreparedDisjunction<'a> {
    query: FOQuery,
    children: Vec<BoxedPrepared<'a>>,
}

fn prepare_disjunction<'a>(
    query: FOQuery,
    ctx: &DataContext<'a>,
    session: &'a Session,
    registry: &'a EvaluatorRegistry,
) -> Result<BoxedPrepared<'a>, PrepareError> {
    let parts = match &query.body {
        Formula::Disjunction(xs) => xs.clone(),
        _ => return Err(PrepareError::Unsupported(query.body.kind())),
    };
    let mut children = Vec::new();
    for part in &parts {
        let free = part.free_variables(session);
        let answer_variables: Vec<VarId> = query
            .answer_variables
            .iter()
            .copied()
            .filter(|v| free.contains(v))
            .collect();
        let sub_query = FOQuery {
            answer_variables,
            body: part.clone(),
        };
        children.push(registry.prepare_expanded(sub_query, ctx, session)?);
    }
    Ok(Box::new(PreparedDisjunction { query, children }))
}

impl<'a> PreparedFOQuery<'a> for PreparedDisjunction<'a> {
    fn query(&self) -> &FOQuery {
        &self.query
    }

    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q,
    {
        // Branch streams are concatenated; execute applies set semantics.
        let mut seen: IndexSet<Vec<(VarId, Term)>> = IndexSet::new();
        let children = &self.children;
        Ok(Box::new(
            children
                .iter()
                .flat_map(move |child| match child.execute(assignment.clone()) {
                    Ok(results) => results,
                    Err(err) => {
                        log::warn!("{err}");
                        Box::new(std::iter::empty())
                    }
                })
                .filter(move |sub| seen.insert(sub.canonical_key())),
        ))
    }

    fn estimate_bound(&self, assignment: &Substitution) -> Option<usize> {
        let mut total = 0usize;
        for child in &self.children {
            total = total.checked_add(child.estimate_bound(assignment)?)?;
        }
        Some(total)
    }

    fn is_evaluable_with(&self, assignment: &Substitution) -> bool {
        self.children
            .iter()
            .any(|c| c.is_evaluable_with(assignment))
    }
}

// ----------------------------------------------------------------------
// Negation
// ----------------------------------------------------------------------

struct PreparedNegation<'a> {
    session: &'a Session,
    query: FOQuery,
    inner: BoxedPrepared<'a>,
    inner_free: IndexSet<VarId>,
}

fn prepare_negation<'a>(
    query: FOQuery,
    ctx: &DataContext<'a>,
    session: &'a Session,
    registry: &'a EvaluatorRegistry,
) -> Result<BoxedPrepared<'a>, PrepareError> {
    let inner_formula = match &query.body {
        Formula::Negation(inner) => inner.as_ref().clone(),
        _ => return Err(PrepareError::Unsupported(query.body.kind())),
    };
    let inner_free = inner_formula.free_variables(session);
    let inner = registry.prepare_expanded(subquery_for(&inner_formula, session), ctx, session)?;
    Ok(Box::new(PreparedNegation {
        session,
        query,
        inner,
        inner_free,
    }))
}

impl<'a> PreparedFOQuery<'a> for PreparedNegation<'a> {
    fn query(&self) -> &FOQuery {
        &self.query
    }

    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q,
    {
        let unbound: Vec<VarId> = self
            .inner_free
            .iter()
            .copied()
            .filter(|&v| assignment.get(v).is_none())
            .collect();
        if !unbound.is_empty() {
            let names: Vec<String> = unbound
                .iter()
                .map(|&v| self.session.variable_name(v))
                .collect();
            // Negation-as-failure over the unbound witnesses: false iff at
            // least one witness exists.
            self.session.warn(
                DiagnosticKind::UnsafeNegation,
                format!(
                    "unsafe negation: variables {} are free in the negated formula",
                    names.join(", ")
                ),
            );
        }
        let witness = self.inner.execute(assignment.clone())?.next();
        if witness.is_some() {
            Ok(Box::new(std::iter::empty()))
        } else {
            Ok(Box::new(std::iter::once(assignment)))
        }
    }

    fn estimate_bound(&self, _assignment: &Substitution) -> Option<usize> {
        Some(1)
    }

    fn is_evaluable_with(&self, assignment: &Substitution) -> bool {
        self.inner_free
            .iter()
            .all(|&v| assignment.get(v).is_some())
    }
}

// ----------------------------------------------------------------------
// Existential quantification
// ----------------------------------------------------------------------

struct PreparedExistential<'a> {
    query: FOQuery,
    inner: BoxedPrepared<'a>,
    bound_vars: Vec<VarId>,
}

fn prepare_existential<'a>(
    query: FOQuery,
    ctx: &DataContext<'a>,
    session: &'a Session,
    registry: &'a EvaluatorRegistry,
) -> Result<BoxedPrepared<'a>, PrepareError> {
    let (bound_vars, inner_formula) = match &query.body {
        Formula::Existential(vars, inner) => (vars.clone(), inner.as_ref().clone()),
        _ => return Err(PrepareError::Unsupported(query.body.kind())),
    };
    let inner = registry.prepare_expanded(subquery_for(&inner_formula, session), ctx, session)?;
    Ok(Box::new(PreparedExistential {
        query,
        inner,
        bound_vars,
    }))
}

impl<'a> PreparedFOQuery<'a> for PreparedExistential<'a> {
    fn query(&self) -> &FOQuery {
        &self.query
    }

    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q,
    {
        let results = self.inner.execute(assignment)?;
        let bound_vars = self.bound_vars.clone();
        let mut seen: IndexSet<Vec<(VarId, Term)>> = IndexSet::new();
        Ok(Box::new(results.filter_map(move |sub| {
            let mut projected = sub;
            for &v in &bound_vars {
                projected.remove(v);
            }
            seen.insert(projected.canonical_key()).then_some(projected)
        })))
    }

    fn estimate_bound(&self, assignment: &Substitution) -> Option<usize> {
        self.inner.estimate_bound(assignment)
    }

    fn is_evaluable_with(&self, assignment: &Substitution) -> bool {
        self.inner.is_evaluable_with(assignment)
    }
}

// ----------------------------------------------------------------------
// Universal quantification
// ----------------------------------------------------------------------

struct PreparedUniversal<'a> {
    session: &'a Session,
    ctx: DataContext<'a>,
    query: FOQuery,
    inner: BoxedPrepared<'a>,
    bound_vars: Vec<VarId>,
    inner_free: IndexSet<VarId>,
}

fn prepare_universal<'a>(
    query: FOQuery,
    ctx: &DataContext<'a>,
    session: &'a Session,
    registry: &'a EvaluatorRegistry,
) -> Result<BoxedPrepared<'a>, PrepareError> {
    let (bound_vars, inner_formula) = match &query.body {
        Formula::Universal(vars, inner) => (vars.clone(), inner.as_ref().clone()),
        _ => return Err(PrepareError::Unsupported(query.body.kind())),
    };
    let inner_free = inner_formula.free_variables(session);
    let inner = registry.prepare_expanded(subquery_for(&inner_formula, session), ctx, session)?;
    Ok(Box::new(PreparedUniversal {
        session,
        ctx: ctx.clone(),
        query,
        inner,
        bound_vars,
        inner_free,
    }))
}

impl<'a> PreparedUniversal<'a> {
    /// Every assignment of the quantified variables over the domain.
    fn domain_assignments(&self, domain: &[Term]) -> Vec<Substitution> {
        if self.bound_vars.is_empty() {
            return vec![Substitution::new()];
        }
        self.bound_vars
            .iter()
            .map(|_| domain.iter().copied())
            .multi_cartesian_product()
            .map(|values| {
                Substitution::from_bindings(
                    self.bound_vars.iter().copied().zip(values),
                )
            })
            .collect()
    }
}

impl<'a> PreparedFOQuery<'a> for PreparedUniversal<'a> {
    fn query(&self) -> &FOQuery {
        &self.query
    }

    fn execute<'q>(
        &'q self,
        assignment: Substitution,
    ) -> Result<SubstitutionIter<'q>, EvaluationError>
    where
        'a: 'q,
    {
        // Policy: a universal quantifier needs a finitely enumerable
        // universe, supplied by a materialized source.
        let domain = match self.ctx.terms() {
            Some(domain) => domain,
            None => {
                self.session.warn(
                    DiagnosticKind::UnsafeUniversal,
                    "universal quantifier over a source with no enumerable term domain",
                );
                return Err(EvaluationError::new(
                    "universal-evaluator",
                    "no data source can enumerate the quantification domain",
                ));
            }
        };
        if domain.is_empty() {
            return Ok(Box::new(std::iter::once(assignment)));
        }
        self.session.warn(
            DiagnosticKind::UnsafeUniversal,
            format!(
                "universal quantifier iterates a domain of {} terms",
                domain.len()
            ),
        );

        let other_free: Vec<VarId> = self
            .inner_free
            .iter()
            .copied()
            .filter(|v| !self.bound_vars.contains(v))
            .filter(|&v| assignment.get(v).is_none())
            .collect();

        if other_free.is_empty() {
            // Closed under the assignment: check every instance.
            for binding in self.domain_assignments(&domain) {
                let extended = binding.compose(&assignment, self.session);
                if self.inner.execute(extended)?.next().is_none() {
                    return Ok(Box::new(std::iter::empty()));
                }
            }
            return Ok(Box::new(std::iter::once(assignment)));
        }

        // Free variables remain: intersect the projected result sets over
        // the whole domain.
        let mut valid: Option<IndexSet<Vec<(VarId, Term)>>> = None;
        for binding in self.domain_assignments(&domain) {
            let extended = binding.compose(&assignment, self.session);
            let mut results: IndexSet<Vec<(VarId, Term)>> = IndexSet::new();
            for sub in self.inner.execute(extended)? {
                let mut projected = sub;
                for &v in &self.bound_vars {
                    projected.remove(v);
                }
                results.insert(projected.canonical_key());
            }
            valid = Some(match valid {
                None => results,
                Some(previous) => previous.intersection(&results).cloned().collect(),
            });
            if valid.as_ref().is_some_and(|v| v.is_empty()) {
                return Ok(Box::new(std::iter::empty()));
            }
        }
        let valid = valid.unwrap_or_default();
        Ok(Box::new(
            valid
                .into_iter()
                .map(|key| Substitution::from_bindings(key)),
        ))
    }

    fn estimate_bound(&self, assignment: &Substitution) -> Option<usize> {
        self.inner.estimate_bound(assignment)
    }

    fn is_evaluable_with(&self, _assignment: &Substitution) -> bool {
        true
    }
}
