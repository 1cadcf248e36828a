// src/workflow/emit.rs

//! Immutable plan snapshot written at finalize time.
//!
//! Output files, all under the output directory:
//!
//! - `<name>.plan.toml`: jobs in dependency order and their edges
//! - `replicas.toml`: files that already exist, checkpoints included
//! - `transformations.toml`: executables and registered containers
//! - `plandag.properties`: `key = value` engine settings, including one
//!   `dagman.<category>.maxjobs = N` line per category limit

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::checkpoint::NoopCheck;
use crate::config::WorkflowConfig;
use crate::container::Container;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::resources::ExecutionProfile;
use crate::workflow::catalog::{
    FileRegistry, LogicalFile, ReplicaEntry, TransformationCatalog, TransformationEntry, sanitize,
};
use crate::workflow::graph::JobGraph;

pub const REPLICAS_FILE_NAME: &str = "replicas.toml";
pub const TRANSFORMATIONS_FILE_NAME: &str = "transformations.toml";
pub const PROPERTIES_FILE_NAME: &str = "plandag.properties";

#[derive(Debug, Clone, Serialize)]
pub struct PlannedJob {
    pub id: String,
    pub locator: String,
    pub transformation: String,
    pub arguments: Vec<String>,
    pub inputs: Vec<LogicalFile>,
    pub outputs: Vec<LogicalFile>,
    /// The job's checkpoint already existed when it was scheduled.
    pub checkpointed: bool,
    pub profile: ExecutionProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedEdge {
    pub parent: String,
    pub child: String,
    pub via: Vec<LogicalFile>,
}

/// Everything the engine needs, frozen.
#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    pub name: String,
    pub created_by: String,
    pub jobs: Vec<PlannedJob>,
    pub edges: Vec<PlannedEdge>,
    pub replicas: Vec<ReplicaEntry>,
    pub transformations: Vec<TransformationEntry>,
    pub containers: Vec<Container>,
    pub category_limits: BTreeMap<String, u32>,
    pub properties: BTreeMap<String, String>,
}

/// Paths written by [`WorkflowPlan::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub plan: PathBuf,
    pub replicas: PathBuf,
    pub transformations: PathBuf,
    pub properties: PathBuf,
}

/// Result of [`WorkflowBuilder::finalize`](crate::workflow::WorkflowBuilder::finalize).
#[derive(Debug, Clone)]
pub struct FinalizedWorkflow {
    pub plan: WorkflowPlan,
    pub written: WrittenFiles,
    /// `None` when the check is disabled in config.
    pub noop_check: Option<NoopCheck>,
    /// Checkpoints were deleted before writing.
    pub purged: bool,
}

#[derive(Serialize)]
struct PlanDocument<'a> {
    name: &'a str,
    created_by: &'a str,
    jobs: &'a [PlannedJob],
    edges: &'a [PlannedEdge],
}

#[derive(Serialize)]
struct ReplicaDocument<'a> {
    replicas: &'a [ReplicaEntry],
}

#[derive(Serialize)]
struct TransformationDocument<'a> {
    transformations: &'a [TransformationEntry],
    containers: &'a [Container],
}

impl WorkflowPlan {
    pub(crate) fn snapshot(
        config: &WorkflowConfig,
        graph: &JobGraph,
        files: &FileRegistry,
        transformations: &TransformationCatalog,
        output_dir: &Path,
    ) -> Result<Self> {
        let jobs = graph
            .topological_order()?
            .into_iter()
            .filter_map(|id| graph.job(id))
            .map(|node| PlannedJob {
                id: node.job_id.clone(),
                locator: node.locator.to_name(),
                transformation: node.transformation.clone(),
                arguments: node.arguments.clone(),
                inputs: node.inputs.clone(),
                outputs: node.outputs.clone(),
                checkpointed: node.checkpoint.is_preexisting(),
                profile: node.profile.clone(),
            })
            .collect();

        let edges = graph
            .edges()
            .filter_map(|(parent, child, edge)| {
                Some(PlannedEdge {
                    parent: graph.job(parent)?.job_id.clone(),
                    child: graph.job(child)?.job_id.clone(),
                    via: edge.via.clone(),
                })
            })
            .collect();

        let mut properties = BTreeMap::from([
            (
                "pegasus.data.configuration".to_string(),
                config.data_configuration.clone(),
            ),
            (
                "pegasus.catalog.replica.file".to_string(),
                output_dir.join(REPLICAS_FILE_NAME).display().to_string(),
            ),
            (
                "pegasus.catalog.transformation.file".to_string(),
                output_dir.join(TRANSFORMATIONS_FILE_NAME).display().to_string(),
            ),
        ]);
        for (category, max_jobs) in graph.category_limits() {
            properties.insert(category_limit_key(category), max_jobs.to_string());
        }

        Ok(Self {
            name: config.name.clone(),
            created_by: config.created_by.clone(),
            jobs,
            edges,
            replicas: files.replicas().to_vec(),
            transformations: transformations.entries().to_vec(),
            containers: transformations.containers().to_vec(),
            category_limits: graph.category_limits().clone(),
            properties,
        })
    }

    /// `dagman.<category>.maxjobs = N` for every limited category.
    pub fn category_limit_lines(&self) -> Vec<String> {
        self.category_limits
            .iter()
            .map(|(category, max_jobs)| format!("{} = {max_jobs}", category_limit_key(category)))
            .collect()
    }

    pub fn property_lines(&self) -> Vec<String> {
        self.properties
            .iter()
            .map(|(key, value)| format!("{key} = {value}"))
            .collect()
    }

    pub fn write(&self, fs: &dyn FileSystem, output_dir: &Path) -> Result<WrittenFiles> {
        let written = WrittenFiles {
            plan: output_dir.join(format!("{}.plan.toml", sanitize(&self.name))),
            replicas: output_dir.join(REPLICAS_FILE_NAME),
            transformations: output_dir.join(TRANSFORMATIONS_FILE_NAME),
            properties: output_dir.join(PROPERTIES_FILE_NAME),
        };

        let plan = toml::to_string(&PlanDocument {
            name: &self.name,
            created_by: &self.created_by,
            jobs: &self.jobs,
            edges: &self.edges,
        })?;
        fs.write(&written.plan, plan.as_bytes())?;

        let replicas = toml::to_string(&ReplicaDocument {
            replicas: &self.replicas,
        })?;
        fs.write(&written.replicas, replicas.as_bytes())?;

        let transformations = toml::to_string(&TransformationDocument {
            transformations: &self.transformations,
            containers: &self.containers,
        })?;
        fs.write(&written.transformations, transformations.as_bytes())?;

        let mut properties = self.property_lines().join("\n");
        properties.push('\n');
        fs.write(&written.properties, properties.as_bytes())?;

        Ok(written)
    }
}

fn category_limit_key(category: &str) -> String {
    format!("dagman.{category}.maxjobs")
}
