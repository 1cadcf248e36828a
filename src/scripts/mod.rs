// src/scripts/mod.rs

//! Generated shell scripts.
//!
//! Each job runs a small bash script in its working directory: change into
//! the directory, run the caller's pre-job commands, run the entry point
//! with its output teed to a log, run the post-job commands, and finally
//! touch the checkpoint sentinel.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::fs::FileSystem;

pub mod conda;
pub mod docker;

pub use conda::{CondaConfiguration, CondaScriptWriter};
pub use docker::DockerScriptWriter;

pub const RUN_SCRIPT_NAME: &str = "___run.sh";
pub const STDOUT_FILE_NAME: &str = "___stdout.log";
pub const BASH_SCRIPT_NAME: &str = "script.sh";

/// Everything a writer needs to produce one job script.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub working_directory: PathBuf,
    pub script_path: PathBuf,
    /// The command line doing the job's actual work.
    pub entry_point: String,
    pub stdout_file: PathBuf,
    pub checkpoint: PathBuf,
    pub pre_job: Vec<String>,
    pub post_job: Vec<String>,
    /// Per-job environment override; writers that don't use one ignore it.
    pub conda: Option<CondaConfiguration>,
}

/// Writes a runnable script for a job and returns its path.
pub trait JobScriptWriter {
    fn write_script(&self, fs: &dyn FileSystem, request: &ScriptRequest) -> Result<PathBuf>;
}

const SCRIPT_HEADER: &str = "#!/usr/bin/env bash

set -e
set -o pipefail

if [[ -z ${PS1+x} ]]
  then
    export PS1=\"\"
fi
";

/// Header, `prelude`, then the job body described by `request`.
pub(crate) fn render_job_script(prelude: &[String], request: &ScriptRequest) -> String {
    let mut script = String::from(SCRIPT_HEADER);
    for line in prelude {
        let _ = writeln!(script, "{line}");
    }
    let _ = writeln!(script, "cd {}", request.working_directory.display());
    for line in &request.pre_job {
        let _ = writeln!(script, "{line}");
    }
    let _ = writeln!(
        script,
        "{} 2>&1 | tee {}",
        request.entry_point,
        request.stdout_file.display()
    );
    for line in &request.post_job {
        let _ = writeln!(script, "{line}");
    }
    let _ = writeln!(script, "touch {}", request.checkpoint.display());
    script
}

pub(crate) fn write_executable(fs: &dyn FileSystem, path: &Path, contents: &str) -> Result<()> {
    fs.write(path, contents.as_bytes())?;
    fs.set_executable(path)?;
    Ok(())
}

/// Script for a plain bash job: the commands in order, then the sentinel.
pub fn write_bash_script(
    fs: &dyn FileSystem,
    working_directory: &Path,
    commands: &[String],
    checkpoint: &Path,
) -> Result<PathBuf> {
    let path = working_directory.join(BASH_SCRIPT_NAME);
    let mut script = String::from(SCRIPT_HEADER);
    let _ = writeln!(script, "cd {}", working_directory.display());
    for command in commands {
        let _ = writeln!(script, "{command}");
    }
    let _ = writeln!(script, "touch {}", checkpoint.display());
    write_executable(fs, &path, &script)?;
    Ok(path)
}
