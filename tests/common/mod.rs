#![allow(dead_code)]

pub use plandag_test_utils::builders::WorkflowConfigBuilder;
pub use plandag_test_utils::init_tracing;

use std::path::Path;
use std::sync::Arc;

use plandag::artifact::{Dep, DependencyNode};
use plandag::checkpoint::{ConfirmPurge, NoopCheck};
use plandag::fs::mock::MockFileSystem;
use plandag::locator::Locator;
use plandag::workflow::{JobOptions, WorkflowBuilder};

pub const ROOT: &str = "/work";

/// A builder rooted at [`ROOT`] on an in-memory filesystem.
pub fn mock_builder() -> (WorkflowBuilder, MockFileSystem) {
    mock_builder_with(WorkflowConfigBuilder::new(Path::new(ROOT)))
}

pub fn mock_builder_with(config: WorkflowConfigBuilder) -> (WorkflowBuilder, MockFileSystem) {
    let fs = MockFileSystem::new();
    let builder = WorkflowBuilder::from_config(config.build()).with_file_system(Arc::new(fs.clone()));
    (builder, fs)
}

pub fn loc(s: &str) -> Locator {
    s.parse().expect("valid locator")
}

/// Schedule `n` independent bash jobs at `jobs/job<i>`.
pub fn bash_nodes(builder: &mut WorkflowBuilder, n: usize) -> Vec<DependencyNode> {
    (0..n)
        .map(|i| {
            builder
                .run_bash(
                    &loc(&format!("jobs/job{i}")),
                    [format!("echo {i}")],
                    Dep::none(),
                    JobOptions::new(),
                )
                .expect("bash job schedules")
        })
        .collect()
}

/// Purge policy that records what it was asked.
#[derive(Debug, Default)]
pub struct RecordingPolicy {
    pub answer: bool,
    pub seen: Vec<NoopCheck>,
}

impl RecordingPolicy {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            seen: Vec::new(),
        }
    }
}

impl ConfirmPurge for RecordingPolicy {
    fn confirm_purge(&mut self, check: &NoopCheck) -> bool {
        self.seen.push(*check);
        self.answer
    }
}
