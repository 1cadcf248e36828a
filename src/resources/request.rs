// src/resources/request.rs

//! Resource requests.
//!
//! A [`ResourceRequest`] is a closed set of backend-specific variants. Two
//! requests of the same variant merge field by field with [`unify`], the
//! override winning wherever it sets a value. [`apply_to_job`] validates the
//! merged request and encodes it into the job's [`ExecutionProfile`].
//!
//! [`unify`]: ResourceRequest::unify
//! [`apply_to_job`]: ResourceRequest::apply_to_job

use tracing::debug;

use crate::errors::{PlandagError, Result};
use crate::resources::memory::MemoryAmount;
use crate::resources::partition::PartitionProvider;
use crate::resources::profile::ExecutionProfile;
use crate::types::ProfileNamespace;

pub const DEFAULT_JOB_TIME_IN_MINUTES: u32 = 1440;
const DEFAULT_CPUS: u32 = 1;
const DEFAULT_GPUS: u32 = 0;
const DEFAULT_MEMORY_GIB: u64 = 2;
const LOCAL_CATEGORY: &str = "local";

/// Partitions addressed with `--qos` instead of `--account`.
const QOS_PARTITIONS: [&str; 2] = ["scavenge", "ephemeral"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRequest {
    Slurm(SlurmResourceRequest),
    Local(LocalResourceRequest),
}

impl ResourceRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceRequest::Slurm(_) => "slurm",
            ResourceRequest::Local(_) => "local",
        }
    }

    pub fn partition(&self) -> Option<&str> {
        match self {
            ResourceRequest::Slurm(r) => r.partition.as_deref(),
            ResourceRequest::Local(_) => None,
        }
    }

    /// Merge `other` over `self`. Fields set in `other` win.
    pub fn unify(&self, other: &ResourceRequest) -> Result<ResourceRequest> {
        match (self, other) {
            (ResourceRequest::Slurm(base), ResourceRequest::Slurm(over)) => {
                Ok(ResourceRequest::Slurm(base.unify(over)))
            }
            (ResourceRequest::Local(base), ResourceRequest::Local(over)) => {
                Ok(ResourceRequest::Local(base.unify(over)))
            }
            (base, over) => Err(PlandagError::IncompatibleResourceRequest {
                base: base.kind(),
                other: over.kind(),
            }),
        }
    }

    /// Validate this request and write it into `profile`.
    ///
    /// When the profile has no concurrency category yet, one is assigned
    /// (the partition name for SLURM requests).
    pub fn apply_to_job(
        &self,
        profile: &mut ExecutionProfile,
        job_name: &str,
        partitions: &dyn PartitionProvider,
    ) -> Result<()> {
        match self {
            ResourceRequest::Slurm(r) => r.apply_to_job(profile, job_name, partitions),
            ResourceRequest::Local(r) => {
                r.apply_to_job(profile, job_name);
                Ok(())
            }
        }
    }
}

impl From<SlurmResourceRequest> for ResourceRequest {
    fn from(r: SlurmResourceRequest) -> Self {
        ResourceRequest::Slurm(r)
    }
}

impl From<LocalResourceRequest> for ResourceRequest {
    fn from(r: LocalResourceRequest) -> Self {
        ResourceRequest::Local(r)
    }
}

/// A request for a job submitted to a SLURM cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlurmResourceRequest {
    partition: Option<String>,
    num_cpus: Option<u32>,
    num_gpus: Option<u32>,
    memory: Option<MemoryAmount>,
    job_time_in_minutes: Option<u32>,
    exclude_list: Option<String>,
    run_on_single_node: Option<String>,
}

impl SlurmResourceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, partition: &str) -> Self {
        self.partition = Some(partition.to_string());
        self
    }

    pub fn with_num_cpus(mut self, cpus: u32) -> Result<Self> {
        if cpus < 1 {
            return Err(PlandagError::InvalidResourceRequest(
                "num_cpus must be at least 1".to_string(),
            ));
        }
        self.num_cpus = Some(cpus);
        Ok(self)
    }

    pub fn with_num_gpus(mut self, gpus: u32) -> Self {
        self.num_gpus = Some(gpus);
        self
    }

    pub fn with_memory(mut self, memory: MemoryAmount) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_job_time_in_minutes(mut self, minutes: u32) -> Self {
        self.job_time_in_minutes = Some(minutes);
        self
    }

    /// Comma-separated node names the job must not run on.
    pub fn with_exclude_list(mut self, nodes: &str) -> Self {
        self.exclude_list = Some(nodes.to_string());
        self
    }

    /// Pin the job to exactly one node.
    pub fn with_run_on_single_node(mut self, node: &str) -> Result<Self> {
        if node.contains(',') {
            return Err(PlandagError::InconsistentNodeConstraint(format!(
                "run_on_single_node must name exactly one node, got `{node}`"
            )));
        }
        self.run_on_single_node = Some(node.to_string());
        Ok(self)
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    pub fn num_cpus(&self) -> Option<u32> {
        self.num_cpus
    }

    pub fn num_gpus(&self) -> Option<u32> {
        self.num_gpus
    }

    pub fn memory(&self) -> Option<MemoryAmount> {
        self.memory
    }

    pub fn job_time_in_minutes(&self) -> Option<u32> {
        self.job_time_in_minutes
    }

    pub fn exclude_list(&self) -> Option<&str> {
        self.exclude_list.as_deref()
    }

    pub fn run_on_single_node(&self) -> Option<&str> {
        self.run_on_single_node.as_deref()
    }

    fn unify(&self, other: &SlurmResourceRequest) -> SlurmResourceRequest {
        SlurmResourceRequest {
            partition: other.partition.clone().or_else(|| self.partition.clone()),
            num_cpus: other.num_cpus.or(self.num_cpus),
            num_gpus: other.num_gpus.or(self.num_gpus),
            memory: other.memory.or(self.memory),
            job_time_in_minutes: other.job_time_in_minutes.or(self.job_time_in_minutes),
            exclude_list: other.exclude_list.clone().or_else(|| self.exclude_list.clone()),
            run_on_single_node: other
                .run_on_single_node
                .clone()
                .or_else(|| self.run_on_single_node.clone()),
        }
    }

    fn excluded_nodes(&self) -> impl Iterator<Item = &str> {
        self.exclude_list
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    fn apply_to_job(
        &self,
        profile: &mut ExecutionProfile,
        job_name: &str,
        partitions: &dyn PartitionProvider,
    ) -> Result<()> {
        let partition_name = self.partition.as_deref().ok_or_else(|| {
            PlandagError::MissingPartition(format!("job {job_name} has no partition to run on"))
        })?;
        let partition = partitions.from_name(partition_name)?;

        if let Some(requested) = self.job_time_in_minutes {
            if requested > partition.max_walltime_minutes {
                return Err(PlandagError::WalltimeExceeded {
                    job: job_name.to_string(),
                    partition: partition.name,
                    requested,
                    max: partition.max_walltime_minutes,
                });
            }
        }

        if let Some(node) = self.run_on_single_node.as_deref() {
            if self.excluded_nodes().any(|excluded| excluded == node) {
                return Err(PlandagError::InconsistentNodeConstraint(format!(
                    "job {job_name} is pinned to `{node}` which is also in its exclude list"
                )));
            }
        }

        let minutes = self
            .job_time_in_minutes
            .unwrap_or(DEFAULT_JOB_TIME_IN_MINUTES.min(partition.max_walltime_minutes));
        let qos_or_account = if QOS_PARTITIONS.contains(&partition_name) {
            "qos"
        } else {
            "account"
        };

        let mut args = format!(
            "--{qos_or_account} {partition_name} --partition {partition_name} --ntasks 1 \
             --cpus-per-task {cpus} --gpus-per-task {gpus} --job-name {job_name} --mem {mem} \
             --time {time}",
            cpus = self.num_cpus.unwrap_or(DEFAULT_CPUS),
            gpus = self.num_gpus.unwrap_or(DEFAULT_GPUS),
            mem = self
                .memory
                .unwrap_or(MemoryAmount::gibibytes(DEFAULT_MEMORY_GIB))
                .to_slurm_string(),
            time = slurm_time(minutes),
        );
        if let Some(exclude) = self.exclude_list.as_deref() {
            args.push_str(&format!(" --exclude={exclude}"));
        }
        if let Some(node) = self.run_on_single_node.as_deref() {
            args.push_str(&format!(" --nodelist={node}"));
        }

        debug!(job = %job_name, slurm = %args, "applying SLURM resource request");
        profile.set(ProfileNamespace::Pegasus, "glite.arguments", args);
        if profile.category().is_none() {
            profile.set(ProfileNamespace::Dagman, "category", partition_name);
        }
        Ok(())
    }
}

/// `H:MM:00`.
fn slurm_time(minutes: u32) -> String {
    format!("{}:{:02}:00", minutes / 60, minutes % 60)
}

/// A request for a job that runs on the submit host itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalResourceRequest {
    num_cpus: Option<u32>,
    memory: Option<MemoryAmount>,
}

impl LocalResourceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_cpus(mut self, cpus: u32) -> Result<Self> {
        if cpus < 1 {
            return Err(PlandagError::InvalidResourceRequest(
                "num_cpus must be at least 1".to_string(),
            ));
        }
        self.num_cpus = Some(cpus);
        Ok(self)
    }

    pub fn with_memory(mut self, memory: MemoryAmount) -> Self {
        self.memory = Some(memory);
        self
    }

    fn unify(&self, other: &LocalResourceRequest) -> LocalResourceRequest {
        LocalResourceRequest {
            num_cpus: other.num_cpus.or(self.num_cpus),
            memory: other.memory.or(self.memory),
        }
    }

    fn apply_to_job(&self, profile: &mut ExecutionProfile, job_name: &str) {
        let cpus = self.num_cpus.unwrap_or(DEFAULT_CPUS);
        let memory_mb = self
            .memory
            .unwrap_or(MemoryAmount::gibibytes(DEFAULT_MEMORY_GIB))
            .as_mebibytes();
        debug!(job = %job_name, cpus, memory_mb, "applying local resource request");
        profile.set(ProfileNamespace::Condor, "request_cpus", cpus.to_string());
        profile.set(ProfileNamespace::Condor, "request_memory", memory_mb.to_string());
        if profile.category().is_none() {
            profile.set(ProfileNamespace::Dagman, "category", LOCAL_CATEGORY);
        }
    }
}
