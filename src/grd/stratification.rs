//! Stratification strategies over the graph of rule dependencies.
//!
//! Every strategy returns an ordered list of strata such that each
//! negative edge points strictly backward. Strongly connected components,
//! Bellman-Ford and topological ordering are delegated to petgraph; only
//! orchestration lives here.

use indexmap::IndexMap;
use petgraph::algo::{bellman_ford, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::grd::Grd;
use crate::kb::RuleBase;
use crate::session::Session;

/// Stratification failure: a cycle through negation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StratificationError {
    NegativeCycle,
    /// Single-evaluation stratification requires an acyclic dependency
    /// graph.
    CyclicRules,
}

impl std::fmt::Display for StratificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StratificationError::NegativeCycle => {
                write!(f, "the rule set has a cycle through negation")
            }
            StratificationError::CyclicRules => {
                write!(f, "single-evaluation stratification needs acyclic dependencies")
            }
        }
    }
}

impl std::error::Error for StratificationError {}

/// The provided stratification strategies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StratificationStrategy {
    /// One stratum per strongly connected component, topologically ordered.
    #[default]
    ByScc,
    /// Bellman-Ford levels; negation costs one level, everything else is
    /// free.
    Minimal,
    /// Strict levels: every dependency costs a level; fails on any cycle.
    SingleEvaluation,
    /// Component levels: independent components share the lowest level
    /// they can.
    MinimalEvaluation,
}

/// Stratify the graph with a strategy.
pub fn stratify(
    grd: &Grd,
    strategy: StratificationStrategy,
    session: &Session,
) -> Result<Vec<RuleBase>, StratificationError> {
    match strategy {
        StratificationStrategy::ByScc => by_scc(grd, session),
        StratificationStrategy::Minimal => bellman_ford_levels(grd, 0.0, -1.0, 0.0, session),
        StratificationStrategy::SingleEvaluation => {
            bellman_ford_levels(grd, -1.0, -1.0, -1.0, session)
                .map_err(|_| StratificationError::CyclicRules)
        }
        StratificationStrategy::MinimalEvaluation => minimal_evaluation(grd, session),
    }
}

/// True iff no strongly connected component carries a negative edge.
pub fn is_stratifiable(grd: &Grd) -> bool {
    let membership = scc_membership(grd);
    grd.edges()
        .all(|edge| edge.positive || membership[edge.source] != membership[edge.target])
}

/// Component index per rule, from petgraph's Tarjan pass.
pub(crate) fn scc_membership(grd: &Grd) -> Vec<usize> {
    let graph = rule_graph(grd, |_| 0.0);
    let components = tarjan_scc(&graph);
    let mut membership = vec![0usize; grd.rules().len()];
    for (index, component) in components.iter().enumerate() {
        for &node in component {
            membership[node.index()] = index;
        }
    }
    membership
}

fn rule_graph(grd: &Grd, weight: impl Fn(bool) -> f64) -> DiGraph<(), f64> {
    let mut graph = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..grd.rules().len()).map(|_| graph.add_node(())).collect();
    for edge in grd.edges() {
        graph.add_edge(nodes[edge.source], nodes[edge.target], weight(edge.positive));
    }
    graph
}

fn by_scc(grd: &Grd, _session: &Session) -> Result<Vec<RuleBase>, StratificationError> {
    let membership = scc_membership(grd);
    for edge in grd.edges() {
        if !edge.positive && membership[edge.source] == membership[edge.target] {
            return Err(StratificationError::NegativeCycle);
        }
    }

    // Tarjan yields components in reverse topological order.
    let graph = rule_graph(grd, |_| 0.0);
    let mut components = tarjan_scc(&graph);
    components.reverse();

    Ok(components
        .into_iter()
        .map(|component| {
            RuleBase::new(
                component
                    .into_iter()
                    .map(|node| grd.rules()[node.index()].clone()),
            )
        })
        .collect())
}

/// Shortest paths from a virtual source reaching every rule; the stratum
/// of a rule is the (negated) distance.
fn bellman_ford_levels(
    grd: &Grd,
    positive_weight: f64,
    negative_weight: f64,
    source_weight: f64,
    _session: &Session,
) -> Result<Vec<RuleBase>, StratificationError> {
    let mut graph: DiGraph<(), f64> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..grd.rules().len()).map(|_| graph.add_node(())).collect();
    for edge in grd.edges() {
        let weight = if edge.positive {
            positive_weight
        } else {
            negative_weight
        };
        graph.add_edge(nodes[edge.source], nodes[edge.target], weight);
    }
    let source = graph.add_node(());
    for &node in &nodes {
        graph.add_edge(source, node, source_weight);
    }

    let paths = bellman_ford(&graph, source).map_err(|_| StratificationError::NegativeCycle)?;

    let mut by_level: IndexMap<i64, Vec<usize>> = IndexMap::new();
    for (rule_index, node) in nodes.iter().enumerate() {
        let level = (-paths.distances[node.index()]) as i64;
        by_level.entry(level).or_default().push(rule_index);
    }
    let mut levels: Vec<i64> = by_level.keys().copied().collect();
    levels.sort_unstable();

    Ok(levels
        .into_iter()
        .map(|level| {
            RuleBase::new(
                by_level[&level]
                    .iter()
                    .map(|&i| grd.rules()[i].clone()),
            )
        })
        .collect())
}

/// Component levels: each strongly connected component sits at one more
/// than the deepest of its predecessors; independent components share
/// levels.
fn minimal_evaluation(grd: &Grd, _session: &Session) -> Result<Vec<RuleBase>, StratificationError> {
    if !is_stratifiable(grd) {
        return Err(StratificationError::NegativeCycle);
    }
    let membership = scc_membership(grd);
    let component_count = membership.iter().copied().max().map_or(0, |m| m + 1);

    let mut predecessors: Vec<indexmap::IndexSet<usize>> =
        vec![indexmap::IndexSet::new(); component_count];
    for edge in grd.edges() {
        let (sc, tc) = (membership[edge.source], membership[edge.target]);
        if sc != tc {
            predecessors[tc].insert(sc);
        }
    }

    // Tarjan's reverse topological order processed backwards gives a
    // forward order over components.
    let graph = rule_graph(grd, |_| 0.0);
    let mut order: Vec<usize> = Vec::new();
    {
        let components = tarjan_scc(&graph);
        for component in components.iter().rev() {
            order.push(membership[component[0].index()]);
        }
    }

    let mut levels: Vec<usize> = vec![0; component_count];
    for &component in &order {
        levels[component] = predecessors[component]
            .iter()
            .map(|&p| levels[p] + 1)
            .max()
            .unwrap_or(0);
    }

    let mut by_level: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for (rule_index, &component) in membership.iter().enumerate() {
        by_level
            .entry(levels[component])
            .or_default()
            .push(rule_index);
    }
    let mut keys: Vec<usize> = by_level.keys().copied().collect();
    keys.sort_unstable();

    Ok(keys
        .into_iter()
        .map(|level| {
            RuleBase::new(
                by_level[&level]
                    .iter()
                    .map(|&i| grd.rules()[i].clone()),
            )
        })
        .collect())
}

/// Hybrid predicate/unifier stratification: coarse predicate components
/// in topological order, each refined with a unifier-mode graph and
/// stratified by components.
pub fn hybrid_predicate_unifier(
    rules: &[crate::rule::Rule],
    session: &Session,
) -> Result<Vec<RuleBase>, StratificationError> {
    use crate::grd::DependencyMode;

    let coarse = Grd::new(rules.to_vec(), DependencyMode::Predicate, session);
    let membership = scc_membership(&coarse);
    let graph = rule_graph(&coarse, |_| 0.0);
    let mut components = tarjan_scc(&graph);
    components.reverse();

    let mut strata = Vec::new();
    for component in components {
        let members: Vec<usize> = component.into_iter().map(|n| n.index()).collect();
        debug_assert!(members.iter().all(|&m| membership[m] == membership[members[0]]));
        let local_rules: Vec<crate::rule::Rule> =
            members.iter().map(|&i| rules[i].clone()).collect();
        let refined = Grd::new(local_rules, DependencyMode::Unifier, session);
        strata.extend(by_scc(&refined, session)?);
    }
    Ok(strata)
}
