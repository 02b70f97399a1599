//! Connected-component resolution over the [`IdGraph`].

use crate::graph::IdGraph;
use shared::{IdNode, Service};
use std::collections::VecDeque;

/// Maximal set of identifiers believed to name the same title
///
/// Members are sorted by service rank, then numeric-aware id order, so the
/// first member of a service is its winning id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    members: Vec<IdNode>,
}

impl Cluster {
    pub fn new(mut members: Vec<IdNode>) -> Self {
        members.sort();
        members.dedup();
        Self { members }
    }

    pub fn members(&self) -> &[IdNode] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    pub fn contains(&self, node: &IdNode) -> bool {
        self.members.binary_search(node).is_ok()
    }

    /// Winning id for `service`, if the cluster has one
    pub fn first_of(&self, service: Service) -> Option<&IdNode> {
        self.members.iter().find(|node| node.service == service)
    }

    /// All ids the cluster holds for `service`, winner first
    pub fn all_of(&self, service: Service) -> impl Iterator<Item = &IdNode> + '_ {
        self.members.iter().filter(move |node| node.service == service)
    }

    /// Distinct services, in rank order
    pub fn services(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.members.iter().map(|node| node.service).collect();
        services.dedup();
        services
    }

    /// Number of ids that lose a same-service conflict
    pub fn conflict_count(&self) -> usize {
        self.members.len() - self.services().len()
    }
}

/// Split the graph into connected components with breadth-first traversal
///
/// Clusters come out ordered by their smallest member, which makes the result
/// independent of the order nodes were inserted in.
pub fn resolve_clusters(graph: &IdGraph) -> Vec<Cluster> {
    let mut visited = vec![false; graph.node_count()];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..graph.node_count() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let mut members = Vec::new();
        while let Some(idx) = queue.pop_front() {
            members.push(graph.node(idx).clone());
            for next in graph.neighbors(idx) {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        clusters.push(Cluster::new(members));
    }

    clusters.sort_by(|a, b| a.members.first().cmp(&b.members.first()));
    clusters
}
