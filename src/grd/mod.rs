//! Graph of rule dependencies.
//!
//! Nodes are rules; an edge `r -> s` means an atom produced by `r` can
//! trigger `s`'s body. Edges from producers into negated body atoms are
//! negative. Dependencies of disjunctive heads are computed per disjunct
//! and unioned.
//!
//! Three edge modes trade precision for cost: predicate equality (cheap),
//! piece-unifier existence (precise), and a hybrid that refines
//! predicate-mode strongly connected components with unifier edges.

pub mod stratification;

use indexmap::{IndexMap, IndexSet};

use crate::formula::ConjunctiveQuery;
use crate::id::PredId;
use crate::rewriting::unifier::{most_general_piece_unifiers, PieceUnifier};
use crate::rule::Rule;
use crate::session::Session;

/// How dependency edges are computed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DependencyMode {
    Predicate,
    #[default]
    Unifier,
    Hybrid,
}

/// Accepts or rejects a unifier-mode dependency edge.
pub trait DependencyChecker {
    fn accepts_positive(
        &self,
        head_rule: &Rule,
        target: &Rule,
        unifier: &PieceUnifier,
        session: &Session,
    ) -> bool;

    fn accepts_negative(
        &self,
        head_rule: &Rule,
        target: &Rule,
        unifier: &PieceUnifier,
        session: &Session,
    ) -> bool {
        self.accepts_positive(head_rule, target, unifier, session)
    }
}

/// The default checker: every unifier witnesses a dependency.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProductivityChecker;

impl DependencyChecker for ProductivityChecker {
    fn accepts_positive(
        &self,
        _head_rule: &Rule,
        _target: &Rule,
        _unifier: &PieceUnifier,
        _session: &Session,
    ) -> bool {
        true
    }
}

/// A dependency edge between rule indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GrdEdge {
    pub source: usize,
    pub target: usize,
    pub positive: bool,
}

/// The graph of rule dependencies.
pub struct Grd {
    rules: Vec<Rule>,
    mode: DependencyMode,
    edges: IndexSet<(usize, usize, bool)>,
}

impl Grd {
    /// Build the graph with the default (accept-all) checker.
    pub fn new(rules: Vec<Rule>, mode: DependencyMode, session: &Session) -> Self {
        Self::with_checker(rules, mode, &ProductivityChecker, session)
    }

    /// Build the graph with an explicit dependency checker.
    pub fn with_checker(
        rules: Vec<Rule>,
        mode: DependencyMode,
        checker: &dyn DependencyChecker,
        session: &Session,
    ) -> Self {
        let mut grd = Grd {
            rules,
            mode,
            edges: IndexSet::new(),
        };
        match mode {
            DependencyMode::Predicate => grd.build_predicate(session),
            DependencyMode::Unifier => grd.build_unifier(checker, session),
            DependencyMode::Hybrid => grd.build_hybrid(checker, session),
        }
        grd
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn mode(&self) -> DependencyMode {
        self.mode
    }

    pub fn edges(&self) -> impl Iterator<Item = GrdEdge> + '_ {
        self.edges.iter().map(|&(source, target, positive)| GrdEdge {
            source,
            target,
            positive,
        })
    }

    /// Rules reachable through one positive edge from `source`.
    pub fn triggered_rules(&self, source: usize) -> IndexSet<usize> {
        self.edges
            .iter()
            .filter(|&&(s, _, positive)| s == source && positive)
            .map(|&(_, t, _)| t)
            .collect()
    }

    /// Rules whose negated body can match atoms produced by `source`.
    pub fn prevented_rules(&self, source: usize) -> IndexSet<usize> {
        self.edges
            .iter()
            .filter(|&&(s, _, positive)| s == source && !positive)
            .map(|&(_, t, _)| t)
            .collect()
    }

    /// `target` and every rule that can transitively trigger it.
    pub fn ancestors(&self, target: usize) -> IndexSet<usize> {
        let mut out: IndexSet<usize> = IndexSet::new();
        let mut pending = vec![target];
        while let Some(current) = pending.pop() {
            if !out.insert(current) {
                continue;
            }
            for &(s, t, positive) in &self.edges {
                if positive && t == current && !out.contains(&s) {
                    pending.push(s);
                }
            }
        }
        out
    }

    fn add_edge(&mut self, source: usize, target: usize, positive: bool) {
        self.edges.insert((source, target, positive));
    }

    // ------------------------------------------------------------------
    // Predicate mode
    // ------------------------------------------------------------------

    fn build_predicate(&mut self, _session: &Session) {
        let produced: Vec<IndexSet<PredId>> = self
            .rules
            .iter()
            .map(|r| {
                r.head_disjuncts()
                    .iter()
                    .flat_map(|d| d.atoms())
                    .map(|a| a.predicate)
                    .collect()
            })
            .collect();
        let mut new_edges = Vec::new();
        for (target, rule) in self.rules.iter().enumerate() {
            let positive: IndexSet<PredId> =
                rule.positive_body().iter().map(|a| a.predicate).collect();
            let negative: IndexSet<PredId> =
                rule.negative_body().iter().map(|a| a.predicate).collect();
            for (source, head_preds) in produced.iter().enumerate() {
                if head_preds.iter().any(|p| positive.contains(p)) {
                    new_edges.push((source, target, true));
                }
                if head_preds.iter().any(|p| negative.contains(p)) {
                    new_edges.push((source, target, false));
                }
            }
        }
        for (source, target, positive) in new_edges {
            self.add_edge(source, target, positive);
        }
    }

    // ------------------------------------------------------------------
    // Unifier mode
    // ------------------------------------------------------------------

    fn build_unifier(&mut self, checker: &dyn DependencyChecker, session: &Session) {
        let rules = self.rules.clone();
        for (source, producer) in rules.iter().enumerate() {
            for disjunct in 0..producer.head_disjuncts().len() {
                // Rename the producing rule apart from the consuming one.
                let head_rule = match producer.extract_conjunctive(disjunct) {
                    Some(rule) => rule.refresh(session),
                    None => continue,
                };
                let head_preds: IndexSet<PredId> = head_rule
                    .head
                    .atoms()
                    .iter()
                    .map(|a| a.predicate)
                    .collect();
                for (target, consumer) in rules.iter().enumerate() {
                    for atom in consumer.positive_body() {
                        if !head_preds.contains(&atom.predicate) {
                            continue;
                        }
                        let probe = ConjunctiveQuery::new([atom.clone()], Vec::new());
                        if most_general_piece_unifiers(&probe, &head_rule, session)
                            .iter()
                            .any(|u| checker.accepts_positive(&head_rule, consumer, u, session))
                        {
                            self.add_edge(source, target, true);
                            break;
                        }
                    }
                    for atom in consumer.negative_body() {
                        if !head_preds.contains(&atom.predicate) {
                            continue;
                        }
                        let probe = ConjunctiveQuery::new([atom.clone()], Vec::new());
                        if most_general_piece_unifiers(&probe, &head_rule, session)
                            .iter()
                            .any(|u| checker.accepts_negative(&head_rule, consumer, u, session))
                        {
                            self.add_edge(source, target, false);
                            break;
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Hybrid mode
    // ------------------------------------------------------------------

    fn build_hybrid(&mut self, checker: &dyn DependencyChecker, session: &Session) {
        // Coarse pass with predicate edges.
        let coarse = Grd::new(self.rules.clone(), DependencyMode::Predicate, session);
        let membership = stratification::scc_membership(&coarse);

        // Keep coarse edges crossing components; refine inside each
        // component with unifier edges.
        for &(source, target, positive) in &coarse.edges {
            if membership[source] != membership[target] {
                self.add_edge(source, target, positive);
            }
        }

        let mut by_component: IndexMap<usize, Vec<usize>> = IndexMap::new();
        for (rule_index, &component) in membership.iter().enumerate() {
            by_component.entry(component).or_default().push(rule_index);
        }
        for (_, members) in by_component {
            let local_rules: Vec<Rule> =
                members.iter().map(|&i| self.rules[i].clone()).collect();
            let refined =
                Grd::with_checker(local_rules, DependencyMode::Unifier, checker, session);
            for &(s, t, positive) in &refined.edges {
                self.add_edge(members[s], members[t], positive);
            }
        }
    }
}
