// src/workflow/options.rs

use std::path::PathBuf;

use crate::container::Container;
use crate::resources::{Profile, ResourceRequest};
use crate::scripts::CondaConfiguration;

/// Optional settings shared by every scheduling call.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Merged over the workflow default.
    pub resource_request: Option<ResourceRequest>,
    /// Overrides the category the resource request would assign.
    pub category: Option<String>,
    pub pre_job: Vec<String>,
    pub post_job: Vec<String>,
    /// Times the engine retries a failed job.
    pub retries: u32,
    pub profiles: Vec<Profile>,
    /// Run a Python job inside this container.
    pub container: Option<Container>,
    /// Host files copied into the container before it runs.
    pub input_files: Vec<PathBuf>,
    /// Host files copied back out of the container after it runs.
    pub output_files: Vec<PathBuf>,
    pub conda: Option<CondaConfiguration>,
    pub use_pypy: bool,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_request(mut self, request: impl Into<ResourceRequest>) -> Self {
        self.resource_request = Some(request.into());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn pre_job(mut self, command: &str) -> Self {
        self.pre_job.push(command.to_string());
        self
    }

    pub fn post_job(mut self, command: &str) -> Self {
        self.post_job.push(command.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn in_container(mut self, container: &Container) -> Self {
        self.container = Some(container.clone());
        self
    }

    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_files.push(path.into());
        self
    }

    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_files.push(path.into());
        self
    }

    pub fn conda(mut self, conda: CondaConfiguration) -> Self {
        self.conda = Some(conda);
        self
    }

    pub fn use_pypy(mut self, use_pypy: bool) -> Self {
        self.use_pypy = use_pypy;
        self
    }
}
