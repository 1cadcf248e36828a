#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use plandag::config::{
    ContainerSection, PartitionSection, RawWorkflowConfig, ResourcesSection, WorkflowConfig,
    WorkflowSection,
};
use plandag::types::ResourceBackend;

/// Builder for `WorkflowConfig` that goes through the same validation as a
/// config file.
///
/// Defaults: namespace `test`, site `local`, one partition `scavenge`
/// (720 minutes) used as the default partition.
pub struct WorkflowConfigBuilder {
    config: RawWorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn new(directory: &Path) -> Self {
        let mut partitions = BTreeMap::new();
        partitions.insert(
            "scavenge".to_string(),
            PartitionSection {
                max_walltime_minutes: 720,
            },
        );
        Self {
            config: RawWorkflowConfig {
                workflow: WorkflowSection {
                    name: "Test".to_string(),
                    created_by: "Testing".to_string(),
                    directory: directory.to_path_buf(),
                    namespace: "test".to_string(),
                    site: "local".to_string(),
                    experiment_name: None,
                    data_configuration: "sharedfs".to_string(),
                    noop_check: true,
                },
                resources: ResourcesSection {
                    partition: Some("scavenge".to_string()),
                    ..ResourcesSection::default()
                },
                partitions,
                conda: None,
                container: ContainerSection::default(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.workflow.name = name.to_string();
        self
    }

    pub fn experiment(mut self, experiment: &str) -> Self {
        self.config.workflow.experiment_name = Some(experiment.to_string());
        self
    }

    pub fn noop_check(mut self, enabled: bool) -> Self {
        self.config.workflow.noop_check = enabled;
        self
    }

    pub fn partition(mut self, name: &str, max_walltime_minutes: u32) -> Self {
        self.config.partitions.insert(
            name.to_string(),
            PartitionSection {
                max_walltime_minutes,
            },
        );
        self
    }

    pub fn default_partition(mut self, name: &str) -> Self {
        self.config.resources.partition = Some(name.to_string());
        self
    }

    pub fn without_default_partition(mut self) -> Self {
        self.config.resources.partition = None;
        self
    }

    pub fn memory(mut self, memory: &str) -> Self {
        self.config.resources.memory = Some(memory.to_string());
        self
    }

    pub fn local_backend(mut self) -> Self {
        self.config.resources = ResourcesSection {
            backend: ResourceBackend::Local,
            ..ResourcesSection::default()
        };
        self
    }

    pub fn scratch_root(mut self, root: &Path) -> Self {
        self.config.container.scratch_root = Some(root.to_path_buf());
        self
    }

    pub fn raw(self) -> RawWorkflowConfig {
        self.config
    }

    pub fn build(self) -> WorkflowConfig {
        WorkflowConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
