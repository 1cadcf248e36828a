// src/checkpoint.rs

//! Checkpoint sentinels and replay.
//!
//! Every job script ends by touching a sentinel file in its working
//! directory. When a workflow is rebuilt, a job whose sentinel is already
//! on disk has its checkpoint registered as a pre-existing replica, so the
//! engine skips it.
//!
//! If *every* job is checkpointed the rebuild would do nothing, which
//! usually means the user forgot to clear state from an earlier run. The
//! builder reports that through a [`NoopCheck`] and asks a [`ConfirmPurge`]
//! policy whether to delete the sentinels.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::{FileSystem, find_files_named};
use crate::locator::Locator;

/// File name every job touches on success.
pub const CHECKPOINT_FILE_NAME: &str = "___ckpt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    /// The sentinel already exists; the job will be skipped.
    Preexisting,
    /// The job still has to run.
    Pending,
}

impl CheckpointState {
    pub fn is_preexisting(self) -> bool {
        self == CheckpointState::Preexisting
    }
}

pub fn checkpoint_path(job_directory: &Path) -> PathBuf {
    job_directory.join(CHECKPOINT_FILE_NAME)
}

/// Logical name of a job's checkpoint file.
pub fn checkpoint_lfn(locator: &Locator) -> String {
    format!("{}/{}", locator.to_name(), CHECKPOINT_FILE_NAME)
}

pub fn checkpoint_state(fs: &dyn FileSystem, path: &Path) -> CheckpointState {
    if fs.exists(path) {
        CheckpointState::Preexisting
    } else {
        CheckpointState::Pending
    }
}

pub fn count_checkpoints(fs: &dyn FileSystem, root: &Path) -> Result<usize> {
    Ok(find_files_named(fs, root, CHECKPOINT_FILE_NAME)?.len())
}

/// Delete every sentinel below `root`. Returns the removed paths.
pub fn purge_checkpoints(fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
    let found = find_files_named(fs, root, CHECKPOINT_FILE_NAME)?;
    for path in &found {
        debug!(path = %path.display(), "removing checkpoint");
        fs.remove_file(path)?;
    }
    info!(root = %root.display(), removed = found.len(), "checkpoints purged");
    Ok(found)
}

/// Job count against sentinel count at finalize time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoopCheck {
    pub num_jobs: usize,
    pub num_checkpoints: usize,
}

impl NoopCheck {
    /// True when a non-empty workflow has a sentinel for every job.
    pub fn looks_like_noop(&self) -> bool {
        self.num_jobs > 0 && self.num_jobs == self.num_checkpoints
    }
}

/// Decides whether checkpoints get purged when a build looks like a no-op.
pub trait ConfirmPurge {
    fn confirm_purge(&mut self, check: &NoopCheck) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPurge;

impl ConfirmPurge for AlwaysPurge {
    fn confirm_purge(&mut self, _check: &NoopCheck) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPurge;

impl ConfirmPurge for NeverPurge {
    fn confirm_purge(&mut self, _check: &NoopCheck) -> bool {
        false
    }
}

/// Asks on a terminal. Anything but `y`/`yes` declines.
#[derive(Debug)]
pub struct InteractivePrompt<R, W> {
    input: R,
    output: W,
}

impl InteractivePrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> InteractivePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, check: &NoopCheck) -> io::Result<bool> {
        write!(
            self.output,
            "All {} jobs already have checkpoints; nothing would run. Delete checkpoints? [y/N] ",
            check.num_jobs
        )?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

impl<R: BufRead, W: Write> ConfirmPurge for InteractivePrompt<R, W> {
    fn confirm_purge(&mut self, check: &NoopCheck) -> bool {
        self.ask(check).unwrap_or_else(|e| {
            warn!(error = %e, "could not read purge confirmation; keeping checkpoints");
            false
        })
    }
}
