//! Lineage tracking: which trigger created which atom.

use indexmap::IndexMap;

use crate::atom::Atom;

/// Provenance of one created atom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineageEntry {
    pub rule_index: usize,
    pub trigger_id: u64,
    /// The source tag, for federated setups.
    pub source: Option<String>,
}

/// Records the (rule, trigger) pair behind each created atom.
pub trait LineageTracker {
    fn record(&mut self, atom: &Atom, rule_index: usize, trigger_id: u64);

    fn lineage_of(&self, atom: &Atom) -> Option<&LineageEntry> {
        let _ = atom;
        None
    }

    fn entries(&self) -> Vec<(Atom, LineageEntry)> {
        Vec::new()
    }
}

/// Tracks nothing.
#[derive(Default)]
pub struct NoLineageTracker;

impl LineageTracker for NoLineageTracker {
    fn record(&mut self, _atom: &Atom, _rule_index: usize, _trigger_id: u64) {}
}

/// Rule and trigger id per created atom.
#[derive(Default)]
pub struct SimpleLineageTracker {
    entries: IndexMap<Atom, LineageEntry>,
}

impl LineageTracker for SimpleLineageTracker {
    fn record(&mut self, atom: &Atom, rule_index: usize, trigger_id: u64) {
        self.entries.entry(atom.clone()).or_insert(LineageEntry {
            rule_index,
            trigger_id,
            source: None,
        });
    }

    fn lineage_of(&self, atom: &Atom) -> Option<&LineageEntry> {
        self.entries.get(atom)
    }

    fn entries(&self) -> Vec<(Atom, LineageEntry)> {
        self.entries
            .iter()
            .map(|(a, e)| (a.clone(), e.clone()))
            .collect()
    }
}

/// Simple tracking stamped with a source tag.
pub struct FederatedLineageTracker {
    source: String,
    entries: IndexMap<Atom, LineageEntry>,
}

impl FederatedLineageTracker {
    pub fn new(source: impl Into<String>) -> Self {
        FederatedLineageTracker {
            source: source.into(),
            entries: IndexMap::new(),
        }
    }
}

impl LineageTracker for FederatedLineageTracker {
    fn record(&mut self, atom: &Atom, rule_index: usize, trigger_id: u64) {
        let source = self.source.clone();
        self.entries.entry(atom.clone()).or_insert(LineageEntry {
            rule_index,
            trigger_id,
            source: Some(source),
        });
    }

    fn lineage_of(&self, atom: &Atom) -> Option<&LineageEntry> {
        self.entries.get(atom)
    }

    fn entries(&self) -> Vec<(Atom, LineageEntry)> {
        self.entries
            .iter()
            .map(|(a, e)| (a.clone(), e.clone()))
            .collect()
    }
}
