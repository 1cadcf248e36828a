// src/workflow/graph.rs

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;

use crate::artifact::{DependencyNode, JobId};
use crate::checkpoint::CheckpointState;
use crate::errors::{PlandagError, Result};
use crate::locator::Locator;
use crate::resources::ExecutionProfile;
use crate::workflow::catalog::LogicalFile;

/// One scheduled job.
#[derive(Debug, Clone)]
pub struct JobNode {
    pub locator: Locator,
    /// Identifier handed to the engine.
    pub job_id: String,
    pub transformation: String,
    pub arguments: Vec<String>,
    pub profile: ExecutionProfile,
    pub inputs: Vec<LogicalFile>,
    pub outputs: Vec<LogicalFile>,
    pub checkpoint: CheckpointState,
}

/// Parent -> child, carrying the parent outputs the child consumes.
#[derive(Debug, Clone, Default)]
pub struct DependencyEdge {
    pub via: Vec<LogicalFile>,
}

/// Jobs, their dependency edges and per-category concurrency limits.
///
/// Edges only ever point from an existing node to a newly added one, so
/// the graph is acyclic by construction.
#[derive(Debug, Default)]
pub struct JobGraph {
    graph: DiGraph<JobNode, DependencyEdge>,
    by_locator: HashMap<Locator, JobId>,
    category_limits: BTreeMap<String, u32>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builder rejects a second job at an occupied locator before it
    /// gets here, so each locator maps to one node.
    pub fn add_job(&mut self, node: JobNode) -> JobId {
        let locator = node.locator.clone();
        let id = JobId::new(self.graph.add_node(node));
        self.by_locator.insert(locator, id);
        id
    }

    pub fn add_dependency(&mut self, parent: &DependencyNode, child: JobId) {
        self.graph.add_edge(
            parent.job().index(),
            child.index(),
            DependencyEdge {
                via: parent.outputs().to_vec(),
            },
        );
    }

    pub fn job(&self, id: JobId) -> Option<&JobNode> {
        self.graph.node_weight(id.index())
    }

    pub fn jobs(&self) -> impl Iterator<Item = (JobId, &JobNode)> {
        self.graph
            .node_indices()
            .map(|idx| (JobId::new(idx), &self.graph[idx]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (JobId, JobId, &DependencyEdge)> {
        self.graph
            .edge_references()
            .map(|e| (JobId::new(e.source()), JobId::new(e.target()), e.weight()))
    }

    pub fn job_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn find_by_locator(&self, locator: &Locator) -> Option<JobId> {
        self.by_locator.get(locator).copied()
    }

    /// Jobs in an order where every parent precedes its children.
    pub fn topological_order(&self) -> Result<Vec<JobId>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(JobId::new).collect())
            .map_err(|cycle| {
                PlandagError::DependencySpecification(format!(
                    "cycle detected involving job '{}'",
                    self.graph[cycle.node_id()].locator
                ))
            })
    }

    /// Latest call wins.
    pub fn set_category_limit(&mut self, category: &str, max_jobs: u32) {
        self.category_limits.insert(category.to_string(), max_jobs);
    }

    pub fn category_limits(&self) -> &BTreeMap<String, u32> {
        &self.category_limits
    }

    /// After a purge nothing is checkpointed any more.
    pub fn mark_all_pending(&mut self) {
        for node in self.graph.node_weights_mut() {
            node.checkpoint = CheckpointState::Pending;
        }
    }
}
