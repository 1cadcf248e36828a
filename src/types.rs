use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PlandagError;

/// Container technology a registered container runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Docker,
    Singularity,
    Shifter,
}

impl FromStr for ContainerType {
    type Err = PlandagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(ContainerType::Docker),
            "singularity" => Ok(ContainerType::Singularity),
            "shifter" => Ok(ContainerType::Shifter),
            _ => Err(PlandagError::UnknownContainerType(s.to_string())),
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerType::Docker => "docker",
            ContainerType::Singularity => "singularity",
            ContainerType::Shifter => "shifter",
        };
        f.write_str(s)
    }
}

/// Which resource-request variant the `[resources]` section describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceBackend {
    /// Jobs are submitted to a SLURM cluster (default).
    #[default]
    Slurm,
    /// Jobs run on the submit host.
    Local,
}

/// Namespace of an execution-profile entry attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileNamespace {
    Condor,
    Dagman,
    Env,
    Globus,
    Pegasus,
    Selector,
}

impl FromStr for ProfileNamespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "condor" => Ok(ProfileNamespace::Condor),
            "dagman" => Ok(ProfileNamespace::Dagman),
            "env" => Ok(ProfileNamespace::Env),
            "globus" => Ok(ProfileNamespace::Globus),
            "pegasus" => Ok(ProfileNamespace::Pegasus),
            "selector" => Ok(ProfileNamespace::Selector),
            other => Err(format!("invalid profile namespace: {other}")),
        }
    }
}

impl fmt::Display for ProfileNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProfileNamespace::Condor => "condor",
            ProfileNamespace::Dagman => "dagman",
            ProfileNamespace::Env => "env",
            ProfileNamespace::Globus => "globus",
            ProfileNamespace::Pegasus => "pegasus",
            ProfileNamespace::Selector => "selector",
        };
        f.write_str(s)
    }
}
