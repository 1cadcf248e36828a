// src/workflow/mod.rs

//! Graph assembly.
//!
//! [`WorkflowBuilder`] is the entry point: it schedules jobs into a
//! [`JobGraph`], tracks logical files and transformations, and writes a
//! [`WorkflowPlan`] when finalized.

pub mod builder;
pub mod catalog;
pub mod emit;
pub mod graph;
pub mod options;

pub use builder::WorkflowBuilder;
pub use catalog::{FileRegistry, LogicalFile, ReplicaEntry, TransformationEntry};
pub use emit::{FinalizedWorkflow, PlannedEdge, PlannedJob, WorkflowPlan, WrittenFiles};
pub use graph::{DependencyEdge, JobGraph, JobNode};
pub use options::JobOptions;
