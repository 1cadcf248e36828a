// src/artifact.rs

//! Dependency handles and their canonicalization.
//!
//! A scheduling call accepts its dependencies in several shapes: a node
//! returned by an earlier call, an [`Artifact`] produced by some jobs, or a
//! list mixing both. [`canonicalize_depends_on`] flattens any accepted shape
//! into a deduplicated set of nodes.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use petgraph::graph::NodeIndex;

use crate::errors::{PlandagError, Result};
use crate::locator::Locator;
use crate::workflow::catalog::LogicalFile;

/// How many levels of list nesting a dependency specification may use.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Identifies a job inside one workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(NodeIndex);

impl JobId {
    pub(crate) fn new(index: NodeIndex) -> Self {
        JobId(index)
    }

    pub fn index(&self) -> NodeIndex {
        self.0
    }
}

/// Opaque handle to a scheduled job and the files it declares as outputs.
///
/// Equality and ordering only look at the job.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    job: JobId,
    outputs: Arc<[LogicalFile]>,
}

impl DependencyNode {
    pub(crate) fn new(job: JobId, outputs: Vec<LogicalFile>) -> Self {
        Self {
            job,
            outputs: outputs.into(),
        }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn outputs(&self) -> &[LogicalFile] {
        &self.outputs
    }
}

impl PartialEq for DependencyNode {
    fn eq(&self, other: &Self) -> bool {
        self.job == other.job
    }
}

impl Eq for DependencyNode {}

impl Hash for DependencyNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.job.hash(state);
    }
}

impl PartialOrd for DependencyNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DependencyNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.job.cmp(&other.job)
    }
}

/// Something that exists once a set of jobs has run.
///
/// A pre-existing artifact depends on nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Artifact {
    depends_on: BTreeSet<DependencyNode>,
    locator: Option<Locator>,
}

impl Artifact {
    pub fn new(depends_on: impl Into<Dep>, locator: Option<Locator>) -> Result<Self> {
        Ok(Self {
            depends_on: canonicalize_depends_on(&depends_on.into())?,
            locator,
        })
    }

    pub fn preexisting(locator: Option<Locator>) -> Self {
        Self {
            depends_on: BTreeSet::new(),
            locator,
        }
    }

    pub fn computed(node: DependencyNode, locator: Option<Locator>) -> Self {
        Self {
            depends_on: BTreeSet::from([node]),
            locator,
        }
    }

    pub fn depends_on(&self) -> &BTreeSet<DependencyNode> {
        &self.depends_on
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }
}

/// An [`Artifact`] carrying an in-memory value, e.g. the path a job writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueArtifact<T> {
    value: T,
    artifact: Artifact,
}

impl<T> ValueArtifact<T> {
    pub fn new(value: T, artifact: Artifact) -> Self {
        Self { value, artifact }
    }

    pub fn preexisting(value: T, locator: Option<Locator>) -> Self {
        Self {
            value,
            artifact: Artifact::preexisting(locator),
        }
    }

    pub fn computed(value: T, node: DependencyNode, locator: Option<Locator>) -> Self {
        Self {
            value,
            artifact: Artifact::computed(node, locator),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.artifact.locator()
    }
}

/// Every shape a dependency specification may take.
#[derive(Debug, Clone)]
pub enum Dep {
    Node(DependencyNode),
    Artifact(Artifact),
    List(Vec<Dep>),
}

impl Dep {
    pub fn none() -> Self {
        Dep::List(Vec::new())
    }
}

impl Default for Dep {
    fn default() -> Self {
        Dep::none()
    }
}

impl From<DependencyNode> for Dep {
    fn from(node: DependencyNode) -> Self {
        Dep::Node(node)
    }
}

impl From<&DependencyNode> for Dep {
    fn from(node: &DependencyNode) -> Self {
        Dep::Node(node.clone())
    }
}

impl From<Artifact> for Dep {
    fn from(artifact: Artifact) -> Self {
        Dep::Artifact(artifact)
    }
}

impl From<&Artifact> for Dep {
    fn from(artifact: &Artifact) -> Self {
        Dep::Artifact(artifact.clone())
    }
}

impl<T> From<&ValueArtifact<T>> for Dep {
    fn from(artifact: &ValueArtifact<T>) -> Self {
        Dep::Artifact(artifact.artifact.clone())
    }
}

impl<T: Into<Dep>> From<Vec<T>> for Dep {
    fn from(items: Vec<T>) -> Self {
        Dep::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Dep>> From<Option<T>> for Dep {
    fn from(item: Option<T>) -> Self {
        item.map(Into::into).unwrap_or_default()
    }
}

impl From<&[DependencyNode]> for Dep {
    fn from(nodes: &[DependencyNode]) -> Self {
        Dep::List(nodes.iter().cloned().map(Dep::Node).collect())
    }
}

/// Flatten `dep` into a set of nodes, allowing [`DEFAULT_MAX_DEPTH`]
/// levels of list nesting.
pub fn canonicalize_depends_on(dep: &Dep) -> Result<BTreeSet<DependencyNode>> {
    canonicalize_with_depth(dep, DEFAULT_MAX_DEPTH)
}

/// Flatten `dep`, allowing `max_depth` levels of list nesting.
///
/// A list counts as one level; nodes and artifacts inside it do not. An
/// artifact's own dependencies are already canonical.
pub fn canonicalize_with_depth(dep: &Dep, max_depth: usize) -> Result<BTreeSet<DependencyNode>> {
    let mut out = BTreeSet::new();
    collect(dep, max_depth, &mut out)?;
    Ok(out)
}

fn collect(dep: &Dep, remaining: usize, out: &mut BTreeSet<DependencyNode>) -> Result<()> {
    match dep {
        Dep::Node(node) => {
            out.insert(node.clone());
        }
        Dep::Artifact(artifact) => {
            out.extend(artifact.depends_on.iter().cloned());
        }
        Dep::List(items) => {
            if remaining == 0 {
                return Err(PlandagError::DependencySpecification(
                    "dependency lists are nested too deeply".to_string(),
                ));
            }
            for item in items {
                collect(item, remaining - 1, out)?;
            }
        }
    }
    Ok(())
}
