// src/container.rs

//! Containers and host-to-container path remapping.
//!
//! A Python job run inside a container cannot see host paths. Each declared
//! input and output file gets three locations:
//!
//! - `host`: where the file lives on shared storage
//! - `staging`: a per-job scratch directory bind-mounted into the container
//! - `in_container`: the same file as seen from inside the container
//!
//! Inputs are copied host -> staging before the container starts; outputs
//! are copied back afterwards. Because every file lands directly in the
//! mount root, two files with the same basename would collide.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::{PlandagError, Result};
use crate::locator::Locator;
use crate::parameters::{ParamValue, Parameters};
use crate::types::ContainerType;

/// Name of the parameter file handed to a containerized Python job.
pub const PARAMS_FILE_NAME: &str = "____params.params";

pub const DEFAULT_SCRATCH_ROOT: &str = "/scratch/dockermount";
pub const DEFAULT_MOUNT_ROOT: &str = "/data";
pub const DEFAULT_CONTAINER_PYTHON: &str = "/usr/local/bin/python";

/// A container registered with the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub name: String,
    pub container_type: ContainerType,
    /// Image reference or path to a saved image archive.
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    pub mounts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_site: Option<String>,
}

impl Container {
    /// Parse `container_type` and build the container.
    pub fn new(name: &str, container_type: &str, image: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(PlandagError::ConfigError(
                "container name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            container_type: container_type.parse()?,
            image: image.to_string(),
            arguments: None,
            mounts: Vec::new(),
            image_site: None,
        })
    }

    pub fn with_arguments(mut self, arguments: &str) -> Self {
        self.arguments = Some(arguments.to_string());
        self
    }

    pub fn with_mounts<I, S>(mut self, mounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mounts = mounts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_image_site(mut self, site: &str) -> Self {
        self.image_site = Some(site.to_string());
        self
    }

    /// The image path when it differs from the name, i.e. a saved archive.
    pub fn image_archive(&self) -> Option<&str> {
        (self.image != self.name).then_some(self.image.as_str())
    }
}

/// One invocation of a container image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRun {
    /// Image reference passed to `docker run`.
    pub image: String,
    /// Saved image loaded before the run, if any.
    pub image_archive: Option<String>,
    pub docker_args: String,
    pub command: String,
}

impl ContainerRun {
    pub fn new(image: &str, docker_args: &str, command: &str) -> Self {
        Self {
            image: image.to_string(),
            image_archive: None,
            docker_args: docker_args.to_string(),
            command: command.to_string(),
        }
    }

    pub fn with_image_archive(mut self, archive: &str) -> Self {
        self.image_archive = Some(archive.to_string());
        self
    }

    /// Run `container`, loading its image archive first when the image is
    /// stored separately from the name.
    pub fn for_container(container: &Container, docker_args: &str, command: &str) -> Self {
        let run = Self::new(&container.name, docker_args, command);
        match container.image_archive() {
            Some(archive) => run.with_image_archive(archive),
            None => run,
        }
    }
}

/// Where container jobs stage files and how they invoke Python.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSettings {
    pub scratch_root: PathBuf,
    pub mount_root: PathBuf,
    pub python: PathBuf,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            scratch_root: PathBuf::from(DEFAULT_SCRATCH_ROOT),
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            python: PathBuf::from(DEFAULT_CONTAINER_PYTHON),
        }
    }
}

impl ContainerSettings {
    /// `<scratch_root>/<workflow>/<locator segments...>`.
    pub fn staging_directory(&self, workflow: &str, locator: &Locator) -> PathBuf {
        locator.to_working_directory(&self.scratch_root.join(workflow))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFileMapping {
    pub name: String,
    pub host: PathBuf,
    pub staging: PathBuf,
    pub in_container: PathBuf,
}

impl ContainerFileMapping {
    fn new(name: &str, host: PathBuf, staging_dir: &Path, mount_root: &Path) -> Self {
        Self {
            name: name.to_string(),
            staging: staging_dir.join(name),
            in_container: mount_root.join(name),
            host,
        }
    }
}

/// The full set of mappings for one containerized job.
#[derive(Debug, Clone)]
pub struct ContainerRemap {
    staging_dir: PathBuf,
    mount_root: PathBuf,
    inputs: Vec<ContainerFileMapping>,
    outputs: Vec<ContainerFileMapping>,
    by_host: BTreeMap<PathBuf, PathBuf>,
}

impl ContainerRemap {
    /// Plan the mappings for `inputs` and `outputs`.
    ///
    /// Fails with [`PlandagError::DuplicateContainerFileName`] when two
    /// files (or one file listed twice) share a basename, or a file is
    /// named like the generated parameter file.
    pub fn plan(
        job: &Locator,
        staging_dir: &Path,
        mount_root: &Path,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
    ) -> Result<Self> {
        let mut names = BTreeSet::from([PARAMS_FILE_NAME.to_string()]);
        let mut map = |paths: &[PathBuf]| -> Result<Vec<ContainerFileMapping>> {
            paths
                .iter()
                .map(|path| {
                    let host = std::path::absolute(path)?;
                    let name = host
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| {
                            PlandagError::ConfigError(format!(
                                "container file {} has no file name",
                                path.display()
                            ))
                        })?;
                    if !names.insert(name.clone()) {
                        return Err(PlandagError::DuplicateContainerFileName {
                            job: job.to_name(),
                            name,
                        });
                    }
                    Ok(ContainerFileMapping::new(&name, host, staging_dir, mount_root))
                })
                .collect()
        };
        let inputs = map(inputs)?;
        let outputs = map(outputs)?;

        let by_host = inputs
            .iter()
            .chain(outputs.iter())
            .map(|m| (m.host.clone(), m.in_container.clone()))
            .collect();

        Ok(Self {
            staging_dir: staging_dir.to_path_buf(),
            mount_root: mount_root.to_path_buf(),
            inputs,
            outputs,
            by_host,
        })
    }

    pub fn inputs(&self) -> &[ContainerFileMapping] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ContainerFileMapping] {
        &self.outputs
    }

    pub fn in_container_path(&self, host: &Path) -> Option<&Path> {
        self.by_host.get(host).map(PathBuf::as_path)
    }

    /// Mapping for the parameter file written at `host`.
    pub fn params_file(&self, host: &Path) -> ContainerFileMapping {
        ContainerFileMapping::new(
            PARAMS_FILE_NAME,
            host.to_path_buf(),
            &self.staging_dir,
            &self.mount_root,
        )
    }

    /// Replace every path-valued parameter that names a mapped file with
    /// its in-container path.
    pub fn rewrite_parameters(&self, params: &Parameters) -> Parameters {
        params.map_values(|value| self.rewrite_value(value))
    }

    fn rewrite_value(&self, value: &ParamValue) -> ParamValue {
        match value {
            ParamValue::Path(p) => match std::path::absolute(p)
                .ok()
                .and_then(|abs| self.in_container_path(&abs).map(Path::to_path_buf))
            {
                Some(mapped) => ParamValue::String(mapped.display().to_string()),
                None => value.clone(),
            },
            ParamValue::String(s) => match self.in_container_path(Path::new(s)) {
                Some(mapped) => ParamValue::String(mapped.display().to_string()),
                None => value.clone(),
            },
            ParamValue::List(items) => {
                ParamValue::List(items.iter().map(|v| self.rewrite_value(v)).collect())
            }
            ParamValue::Table(table) => ParamValue::Table(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), self.rewrite_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Replace whitespace-separated tokens that name a mapped file.
    pub fn rewrite_args(&self, args: &str) -> String {
        args.split_whitespace()
            .map(|token| match self.in_container_path(Path::new(token)) {
                Some(mapped) => mapped.display().to_string(),
                None => token.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Bind-mount arguments followed by the caller's own.
    pub fn docker_args(&self, user_args: &str) -> String {
        format!(
            "--rm -v {}:{} {}",
            self.staging_dir.display(),
            self.mount_root.display(),
            user_args
        )
        .trim_end()
        .to_string()
    }

    /// Create the staging dir and copy inputs in, then the caller's commands.
    pub fn pre_job_commands(
        &self,
        params_file: Option<&ContainerFileMapping>,
        user: &[String],
    ) -> Vec<String> {
        let mut commands = vec![format!("mkdir -p {}", self.staging_dir.display())];
        commands.extend(
            params_file
                .into_iter()
                .chain(self.inputs.iter())
                .map(|m| format!("cp {} {}", m.host.display(), m.staging.display())),
        );
        commands.extend(user.iter().cloned());
        commands
    }

    /// Copy outputs back to the host, then the caller's commands.
    pub fn post_job_commands(&self, user: &[String]) -> Vec<String> {
        let mut commands: Vec<String> = self
            .outputs
            .iter()
            .map(|m| format!("cp {} {}", m.staging.display(), m.host.display()))
            .collect();
        commands.extend(user.iter().cloned());
        commands
    }
}
