// src/resources/mod.rs

//! Resource requests and their engine encoding.
//!
//! - [`memory`] parses human memory amounts such as `"2G"`.
//! - [`partition`] resolves partition names to their limits.
//! - [`profile`] is the per-job execution profile the requests write into.
//! - [`request`] holds the closed set of request variants with `unify` and
//!   `apply_to_job`.

pub mod memory;
pub mod partition;
pub mod profile;
pub mod request;

pub use memory::MemoryAmount;
pub use partition::{Partition, PartitionProvider, PartitionTable};
pub use profile::{ExecutionProfile, Profile};
pub use request::{LocalResourceRequest, ResourceRequest, SlurmResourceRequest};
