// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::container::ContainerSettings;
use crate::resources::{LocalResourceRequest, PartitionTable, ResourceRequest};
use crate::scripts::CondaConfiguration;
use crate::types::ResourceBackend;

/// Configuration file as read from TOML, before validation.
///
/// ```toml
/// [workflow]
/// name = "Test"
/// directory = "/nas/working"
/// namespace = "test"
/// site = "saga"
///
/// [resources]
/// partition = "scavenge"
/// num_cpus = 2
///
/// [partitions.scavenge]
/// max_walltime_minutes = 720
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowConfig {
    pub workflow: WorkflowSection,

    /// Graph-wide default resource request.
    #[serde(default)]
    pub resources: ResourcesSection,

    /// Partitions jobs may be submitted to, keyed by name.
    #[serde(default)]
    pub partitions: BTreeMap<String, PartitionSection>,

    #[serde(default)]
    pub conda: Option<CondaSection>,

    #[serde(default)]
    pub container: ContainerSection,
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_created_by")]
    pub created_by: String,

    /// Root of all job working directories.
    pub directory: PathBuf,

    pub namespace: String,

    pub site: String,

    /// Prefix for engine job ids; empty means none.
    #[serde(default)]
    pub experiment_name: Option<String>,

    #[serde(default = "default_data_configuration")]
    pub data_configuration: String,

    /// Whether `finalize` checks for an all-checkpointed rebuild.
    #[serde(default = "default_noop_check")]
    pub noop_check: bool,
}

fn default_name() -> String {
    "Workflow".to_string()
}

fn default_created_by() -> String {
    "Default Constructor".to_string()
}

fn default_data_configuration() -> String {
    "sharedfs".to_string()
}

fn default_noop_check() -> bool {
    true
}

/// `[resources]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourcesSection {
    #[serde(default)]
    pub backend: ResourceBackend,
    pub partition: Option<String>,
    pub num_cpus: Option<u32>,
    pub num_gpus: Option<u32>,
    /// e.g. `"2G"`, `"512M"`.
    pub memory: Option<String>,
    pub job_time_in_minutes: Option<u32>,
    pub exclude_list: Option<String>,
    pub run_on_single_node: Option<String>,
}

/// `[partitions.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionSection {
    pub max_walltime_minutes: u32,
}

/// `[conda]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CondaSection {
    pub base_path: PathBuf,
    pub environment: String,
}

/// `[container]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerSection {
    pub scratch_root: Option<PathBuf>,
    pub mount_root: Option<PathBuf>,
    pub python: Option<PathBuf>,
}

/// Validated configuration the builder is constructed from.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub name: String,
    pub created_by: String,
    pub directory: PathBuf,
    pub namespace: String,
    pub site: String,
    pub experiment_name: Option<String>,
    pub data_configuration: String,
    pub noop_check: bool,
    pub default_resources: ResourceRequest,
    pub partitions: PartitionTable,
    pub conda: Option<CondaConfiguration>,
    pub container: ContainerSettings,
}

impl WorkflowConfig {
    /// A workflow whose jobs all run on the submit host.
    pub fn local(name: &str, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            created_by: default_created_by(),
            directory: directory.into(),
            namespace: name.to_string(),
            site: "local".to_string(),
            experiment_name: None,
            data_configuration: default_data_configuration(),
            noop_check: default_noop_check(),
            default_resources: LocalResourceRequest::new().into(),
            partitions: PartitionTable::new(),
            conda: None,
            container: ContainerSettings::default(),
        }
    }
}
