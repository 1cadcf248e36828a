// src/scripts/conda.rs

use std::path::PathBuf;

use tracing::debug;

use super::{JobScriptWriter, ScriptRequest, render_job_script, write_executable};
use crate::errors::Result;
use crate::fs::FileSystem;

/// A conda installation and the environment to activate in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaConfiguration {
    pub base_path: PathBuf,
    pub environment: String,
}

impl CondaConfiguration {
    pub fn new(base_path: impl Into<PathBuf>, environment: &str) -> Self {
        Self {
            base_path: base_path.into(),
            environment: environment.to_string(),
        }
    }

    fn activation_lines(&self) -> Vec<String> {
        vec![
            format!(
                "source {}",
                self.base_path.join("etc/profile.d/conda.sh").display()
            ),
            format!("conda activate {}", self.environment),
        ]
    }
}

/// Writes scripts for Python jobs running on the host.
///
/// A request's own [`CondaConfiguration`] wins over the writer's default.
/// Without either, the script runs in whatever environment the job starts in.
#[derive(Debug, Clone, Default)]
pub struct CondaScriptWriter {
    default: Option<CondaConfiguration>,
}

impl CondaScriptWriter {
    pub fn new(default: Option<CondaConfiguration>) -> Self {
        Self { default }
    }
}

impl JobScriptWriter for CondaScriptWriter {
    fn write_script(&self, fs: &dyn FileSystem, request: &ScriptRequest) -> Result<PathBuf> {
        let prelude = request
            .conda
            .as_ref()
            .or(self.default.as_ref())
            .map(CondaConfiguration::activation_lines)
            .unwrap_or_default();
        debug!(script = %request.script_path.display(), "writing python job script");
        write_executable(
            fs,
            &request.script_path,
            &render_job_script(&prelude, request),
        )?;
        Ok(request.script_path.clone())
    }
}
