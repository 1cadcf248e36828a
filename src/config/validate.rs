// src/config/validate.rs

use crate::config::model::{
    ContainerSection, RawWorkflowConfig, ResourcesSection, WorkflowConfig, WorkflowSection,
};
use crate::container::ContainerSettings;
use crate::errors::{PlandagError, Result};
use crate::resources::{
    LocalResourceRequest, MemoryAmount, PartitionTable, ResourceRequest, SlurmResourceRequest,
};
use crate::scripts::CondaConfiguration;
use crate::types::ResourceBackend;

impl TryFrom<RawWorkflowConfig> for WorkflowConfig {
    type Error = PlandagError;

    fn try_from(raw: RawWorkflowConfig) -> std::result::Result<Self, Self::Error> {
        validate_workflow_section(&raw.workflow)?;
        let partitions = build_partitions(&raw)?;
        let default_resources = build_default_resources(&raw.resources, &partitions)?;

        let workflow = raw.workflow;
        Ok(WorkflowConfig {
            name: workflow.name,
            created_by: workflow.created_by,
            directory: workflow.directory,
            namespace: workflow.namespace,
            site: workflow.site,
            experiment_name: workflow.experiment_name.filter(|e| !e.is_empty()),
            data_configuration: workflow.data_configuration,
            noop_check: workflow.noop_check,
            default_resources,
            partitions,
            conda: raw
                .conda
                .map(|c| CondaConfiguration::new(c.base_path, &c.environment)),
            container: container_settings(raw.container),
        })
    }
}

fn validate_workflow_section(workflow: &WorkflowSection) -> Result<()> {
    for (field, value) in [
        ("name", &workflow.name),
        ("namespace", &workflow.namespace),
        ("site", &workflow.site),
    ] {
        if value.trim().is_empty() {
            return Err(PlandagError::ConfigError(format!(
                "[workflow].{field} must not be empty"
            )));
        }
    }
    if workflow.directory.as_os_str().is_empty() {
        return Err(PlandagError::ConfigError(
            "[workflow].directory must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn build_partitions(cfg: &RawWorkflowConfig) -> Result<PartitionTable> {
    let mut table = PartitionTable::new();
    for (name, partition) in &cfg.partitions {
        if partition.max_walltime_minutes == 0 {
            return Err(PlandagError::ConfigError(format!(
                "[partitions.{name}].max_walltime_minutes must be >= 1 (got 0)"
            )));
        }
        table.insert(name, partition.max_walltime_minutes);
    }
    Ok(table)
}

fn build_default_resources(
    section: &ResourcesSection,
    partitions: &PartitionTable,
) -> Result<ResourceRequest> {
    let memory = section
        .memory
        .as_deref()
        .map(str::parse::<MemoryAmount>)
        .transpose()?;

    match section.backend {
        ResourceBackend::Slurm => {
            let mut request = SlurmResourceRequest::new();
            if let Some(partition) = section.partition.as_deref() {
                if !partitions.contains(partition) {
                    return Err(PlandagError::ConfigError(format!(
                        "[resources].partition '{partition}' has no [partitions.{partition}] section"
                    )));
                }
                request = request.with_partition(partition);
            }
            if let Some(cpus) = section.num_cpus {
                request = request.with_num_cpus(cpus)?;
            }
            if let Some(gpus) = section.num_gpus {
                request = request.with_num_gpus(gpus);
            }
            if let Some(memory) = memory {
                request = request.with_memory(memory);
            }
            if let Some(minutes) = section.job_time_in_minutes {
                request = request.with_job_time_in_minutes(minutes);
            }
            if let Some(exclude) = section.exclude_list.as_deref() {
                request = request.with_exclude_list(exclude);
            }
            if let Some(node) = section.run_on_single_node.as_deref() {
                request = request.with_run_on_single_node(node)?;
            }
            Ok(request.into())
        }
        ResourceBackend::Local => {
            let slurm_only = [
                ("partition", section.partition.is_some()),
                ("num_gpus", section.num_gpus.is_some()),
                ("job_time_in_minutes", section.job_time_in_minutes.is_some()),
                ("exclude_list", section.exclude_list.is_some()),
                ("run_on_single_node", section.run_on_single_node.is_some()),
            ];
            if let Some((field, _)) = slurm_only.iter().find(|(_, set)| *set) {
                return Err(PlandagError::ConfigError(format!(
                    "[resources].{field} only applies to the slurm backend"
                )));
            }
            let mut request = LocalResourceRequest::new();
            if let Some(cpus) = section.num_cpus {
                request = request.with_num_cpus(cpus)?;
            }
            if let Some(memory) = memory {
                request = request.with_memory(memory);
            }
            Ok(request.into())
        }
    }
}

fn container_settings(section: ContainerSection) -> ContainerSettings {
    let defaults = ContainerSettings::default();
    ContainerSettings {
        scratch_root: section.scratch_root.unwrap_or(defaults.scratch_root),
        mount_root: section.mount_root.unwrap_or(defaults.mount_root),
        python: section.python.unwrap_or(defaults.python),
    }
}
