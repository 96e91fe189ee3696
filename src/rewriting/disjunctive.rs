//! Disjunctive piece unifiers.
//!
//! For a rule with head `H1 | ... | Hk`, a disjunctive piece unifier picks
//! a non-empty subset of disjuncts and one piece unifier per picked
//! disjunct, over conjunctive queries of the current union. The unifiers
//! must be pairwise compatible: unifiers over the same query unify
//! disjoint parts, and the joined partition stays admissible and keeps the
//! rule's existential variables isolated. Shared frontier variables agree
//! through the joined partition (conflicting ground instantiations produce
//! an inadmissible class).
//!
//! Per-head unifiers are cached between rewriting rounds, so each round
//! only pays for combinations touching a fresh unifier.

use indexmap::{IndexMap, IndexSet};

use crate::formula::{ConjunctiveQuery, UnionQuery};
use crate::id::VarId;
use crate::partition::TermPartition;
use crate::rewriting::unifier::{most_general_piece_unifiers, PieceUnifier};
use crate::rule::Rule;
use crate::session::Session;
use crate::substitution::{safe_renaming, Substitution};

/// A tuple of compatible piece unifiers, at most one per head disjunct.
#[derive(Clone, Debug)]
pub struct DisjunctivePieceUnifier {
    pub rule: Rule,
    /// (head index, unifier) pairs, one per picked disjunct.
    pub unifiers: Vec<(usize, PieceUnifier)>,
}

impl DisjunctivePieceUnifier {
    /// The join of all member partitions.
    pub fn joined_partition(&self) -> TermPartition {
        let mut partition = TermPartition::new();
        for (_, unifier) in &self.unifiers {
            partition.join(&unifier.partition);
        }
        partition
    }

    /// The queries the member unifiers touch, deduplicated.
    pub fn involved_queries(&self) -> Vec<&ConjunctiveQuery> {
        let mut out: Vec<&ConjunctiveQuery> = Vec::new();
        for (_, unifier) in &self.unifiers {
            if !out.contains(&&unifier.query) {
                out.push(&unifier.query);
            }
        }
        out
    }

    /// The atoms of each involved query left un-unified by every member
    /// unifier over that query.
    pub fn remainders(&self) -> Vec<crate::atom::Atom> {
        let mut out = Vec::new();
        for query in self.involved_queries() {
            for atom in query.atoms() {
                let unified = self
                    .unifiers
                    .iter()
                    .filter(|(_, u)| u.query == *query)
                    .any(|(_, u)| u.unified_query_part.contains(atom));
                if !unified {
                    out.push(atom.clone());
                }
            }
        }
        out
    }

    /// The substitution induced by the joined partition, with the union's
    /// answer signature as context.
    pub fn associated_substitution(
        &self,
        answer_variables: &[VarId],
        session: &Session,
    ) -> Option<Substitution> {
        let answer_vars: IndexSet<VarId> = answer_variables.iter().copied().collect();
        let mut context_vars: IndexSet<VarId> = IndexSet::new();
        for query in self.involved_queries() {
            context_vars.extend(query.variables(session));
        }
        self.joined_partition()
            .associated_substitution(&answer_vars, &context_vars, session)
    }
}

/// Enumerates disjunctive piece unifiers incrementally across rewriting
/// rounds.
#[derive(Default)]
pub struct DisjunctivePieceUnifierAlgorithm {
    /// (rule index, head index) -> unifiers seen so far, tagged with the
    /// (pre-renaming) query they came from.
    cache: IndexMap<(usize, usize), Vec<(ConjunctiveQuery, PieceUnifier)>>,
}

impl DisjunctivePieceUnifierAlgorithm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cached unifiers whose query left the union (it was subsumed).
    pub fn cleanup(&mut self, alive: &UnionQuery) {
        for unifiers in self.cache.values_mut() {
            unifiers.retain(|(origin, _)| alive.iter().any(|cq| cq == origin));
        }
    }

    /// Compute the disjunctive piece unifiers of `rule` involving at least
    /// one unifier over a query of `new_cqs`.
    pub fn compute(
        &mut self,
        new_cqs: &UnionQuery,
        rule_index: usize,
        rule: &Rule,
        session: &Session,
    ) -> Vec<DisjunctivePieceUnifier> {
        let disjunct_count = rule.head_disjuncts().len();
        let existentials = rule.existential_variables(session);
        let frontier = rule.frontier(session);
        let answer_vars: IndexSet<VarId> =
            new_cqs.answer_variables.iter().copied().collect();

        // Fresh per-head unifiers against the new queries. Each query gets
        // its non-answer variables renamed once per round, shared by all
        // disjuncts, so cross-disjunct unifiers over one query line up.
        let mut fresh: Vec<Vec<(ConjunctiveQuery, PieceUnifier)>> =
            vec![Vec::new(); disjunct_count];
        for cq in new_cqs.iter() {
            let renaming = safe_renaming(&cq.existential_variables(session), session);
            let renamed = cq.apply(&renaming, session);
            for (head_index, bucket) in fresh.iter_mut().enumerate() {
                let conjunctive = match rule.extract_conjunctive(head_index) {
                    Some(rule) => rule,
                    None => continue,
                };
                bucket.extend(
                    most_general_piece_unifiers(&renamed, &conjunctive, session)
                        .into_iter()
                        .map(|u| (cq.clone(), u)),
                );
            }
        }

        let mut results = Vec::new();
        let mut chosen: Vec<(usize, PieceUnifier)> = Vec::new();
        self.combine(
            rule,
            rule_index,
            &fresh,
            0,
            &mut chosen,
            false,
            &existentials,
            &frontier,
            &answer_vars,
            session,
            &mut results,
        );

        for (head_index, unifiers) in fresh.into_iter().enumerate() {
            self.cache
                .entry((rule_index, head_index))
                .or_default()
                .extend(unifiers);
        }
        results
    }

    #[allow(clippy::too_many_arguments)]
    fn combine(
        &self,
        rule: &Rule,
        rule_index: usize,
        fresh: &[Vec<(ConjunctiveQuery, PieceUnifier)>],
        head_index: usize,
        chosen: &mut Vec<(usize, PieceUnifier)>,
        any_fresh: bool,
        existentials: &IndexSet<VarId>,
        frontier: &IndexSet<VarId>,
        answer_vars: &IndexSet<VarId>,
        session: &Session,
        results: &mut Vec<DisjunctivePieceUnifier>,
    ) {
        if head_index == fresh.len() {
            if chosen.is_empty() || !any_fresh {
                return;
            }
            let candidate = DisjunctivePieceUnifier {
                rule: rule.clone(),
                unifiers: chosen.clone(),
            };
            let joined = candidate.joined_partition();
            if joined.is_admissible(session)
                && joined.is_valid(existentials, frontier, answer_vars, session)
            {
                results.push(candidate);
            }
            return;
        }

        // Skip this disjunct entirely.
        self.combine(
            rule,
            rule_index,
            fresh,
            head_index + 1,
            chosen,
            any_fresh,
            existentials,
            frontier,
            answer_vars,
            session,
            results,
        );

        // Or pick a unifier for it, fresh or cached.
        let cached = self
            .cache
            .get(&(rule_index, head_index))
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let candidates: Vec<(PieceUnifier, bool)> = fresh[head_index]
            .iter()
            .map(|(_, u)| (u.clone(), true))
            .chain(cached.iter().map(|(_, u)| (u.clone(), false)))
            .collect();
        for (unifier, is_fresh) in candidates {
            if !chosen
                .iter()
                .all(|(_, existing)| existing.is_compatible_with(&unifier, session))
            {
                continue;
            }
            chosen.push((head_index, unifier));
            self.combine(
                rule,
                rule_index,
                fresh,
                head_index + 1,
                chosen,
                any_fresh || is_fresh,
                existentials,
                frontier,
                answer_vars,
                session,
                results,
            );
            chosen.pop();
        }
    }
}
