// src/scripts/docker.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{JobScriptWriter, ScriptRequest, render_job_script, write_executable};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::workflow::catalog::sanitize;

/// Writes scripts for container jobs and service start/stop scripts.
#[derive(Debug, Clone, Default)]
pub struct DockerScriptWriter;

impl DockerScriptWriter {
    pub fn new() -> Self {
        Self
    }

    /// `docker run` line for a one-shot container job.
    pub fn run_command(image: &str, docker_args: &str, command: &str) -> String {
        let mut line = String::from("docker run");
        for part in [docker_args.trim(), image, command.trim()] {
            if !part.is_empty() {
                line.push(' ');
                line.push_str(part);
            }
        }
        line
    }

    /// `docker load` line for an image saved as an archive.
    pub fn load_command(archive: &str) -> String {
        format!("docker load --input {archive}")
    }

    /// Write `start.sh` and `stop.sh` for a long-running service container.
    pub fn write_service_scripts(
        &self,
        fs: &dyn FileSystem,
        name: &str,
        image_archive: Option<&str>,
        docker_args: &str,
        start_path: &Path,
        stop_path: &Path,
    ) -> Result<(PathBuf, PathBuf)> {
        let instance = sanitize(name);
        let mut start = String::from("#!/usr/bin/env bash\n\nset -e\n");
        if let Some(archive) = image_archive {
            start.push_str(&Self::load_command(archive));
            start.push('\n');
        }
        start.push_str(&format!(
            "docker run -d --name {instance} {} {name}\n",
            docker_args.trim()
        ));
        let stop = format!("#!/usr/bin/env bash\n\ndocker stop {instance}\n");

        debug!(service = %name, start = %start_path.display(), "writing service scripts");
        write_executable(fs, start_path, &start)?;
        write_executable(fs, stop_path, &stop)?;
        Ok((start_path.to_path_buf(), stop_path.to_path_buf()))
    }
}

impl JobScriptWriter for DockerScriptWriter {
    fn write_script(&self, fs: &dyn FileSystem, request: &ScriptRequest) -> Result<PathBuf> {
        debug!(script = %request.script_path.display(), "writing container job script");
        write_executable(
            fs,
            &request.script_path,
            &render_job_script(&[], request),
        )?;
        Ok(request.script_path.clone())
    }
}
