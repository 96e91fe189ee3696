//! Rule bases and knowledge bases.

use indexmap::IndexSet;

use crate::data::fact_base::InMemoryFactBase;
use crate::id::PredId;
use crate::rule::Rule;
use crate::session::Session;

/// An ordered collection of rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleBase {
    rules: Vec<Rule>,
    pub label: Option<String>,
}

impl RuleBase {
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        RuleBase {
            rules: rules.into_iter().collect(),
            label: None,
        }
    }

    pub fn labeled(rules: impl IntoIterator<Item = Rule>, label: impl Into<String>) -> Self {
        RuleBase {
            rules: rules.into_iter().collect(),
            label: Some(label.into()),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Every predicate occurring in some positive rule body.
    pub fn body_predicates(&self) -> IndexSet<PredId> {
        self.rules
            .iter()
            .flat_map(|r| r.positive_body())
            .map(|a| a.predicate)
            .collect()
    }
}

/// A knowledge base: facts plus rules.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    pub facts: InMemoryFactBase,
    pub rules: RuleBase,
}

impl KnowledgeBase {
    pub fn new(facts: InMemoryFactBase, rules: RuleBase) -> Self {
        KnowledgeBase { facts, rules }
    }

    /// The constraints (rules with the absurd head) of the rule base.
    pub fn constraints<'a>(&'a self, session: &'a Session) -> impl Iterator<Item = &'a Rule> {
        self.rules.iter().filter(|r| r.is_constraint(session))
    }
}
