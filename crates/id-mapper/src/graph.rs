//! Cross-reference graph.
//!
//! Vertices are `(service, id)` pairs; an undirected edge means some record
//! claims both identifiers belong to the same title. Every record contributes
//! a clique over its own node and its claimed external nodes.

use shared::{IdNode, SourceRecord};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct IdGraph {
    nodes: Vec<IdNode>,
    index: HashMap<IdNode, usize>,
    adjacency: Vec<BTreeSet<usize>>,
    edge_count: usize,
}

impl IdGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a SourceRecord>) -> Self {
        let mut graph = Self::new();
        for record in records {
            graph.add_record(record);
        }
        graph
    }

    pub fn add_record(&mut self, record: &SourceRecord) {
        self.add_clique(&record.linked_nodes());
    }

    /// Connect every pair of `nodes`; a single node is added isolated
    pub fn add_clique(&mut self, nodes: &[IdNode]) {
        let indexes: Vec<usize> = nodes.iter().map(|node| self.intern(node)).collect();
        for (i, &a) in indexes.iter().enumerate() {
            for &b in &indexes[i + 1..] {
                self.add_edge(a, b);
            }
        }
    }

    fn intern(&mut self, node: &IdNode) -> usize {
        if let Some(&idx) = self.index.get(node) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(node.clone());
        self.index.insert(node.clone(), idx);
        self.adjacency.push(BTreeSet::new());
        idx
    }

    fn add_edge(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        if self.adjacency[a].insert(b) {
            self.adjacency[b].insert(a);
            self.edge_count += 1;
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn nodes(&self) -> &[IdNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &IdNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, node: &IdNode) -> Option<usize> {
        self.index.get(node).copied()
    }

    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[idx].iter().copied()
    }

    pub fn contains_edge(&self, a: &IdNode, b: &IdNode) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.adjacency[a].contains(&b),
            _ => false,
        }
    }
}
