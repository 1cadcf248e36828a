use std::collections::BTreeMap;

use crate::errors::{PlandagError, Result};

/// A cluster partition and the limits requests are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub max_walltime_minutes: u32,
}

/// Resolves partition names, e.g. from configuration or a site inventory.
pub trait PartitionProvider {
    fn from_name(&self, name: &str) -> Result<Partition>;
}

/// Partition limits declared up front (the `[partitions]` config table).
#[derive(Debug, Clone, Default)]
pub struct PartitionTable {
    limits: BTreeMap<String, u32>,
}

impl PartitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, name: &str, max_walltime_minutes: u32) -> Self {
        self.insert(name, max_walltime_minutes);
        self
    }

    pub fn insert(&mut self, name: &str, max_walltime_minutes: u32) {
        self.limits.insert(name.to_string(), max_walltime_minutes);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.limits.contains_key(name)
    }
}

impl PartitionProvider for PartitionTable {
    fn from_name(&self, name: &str) -> Result<Partition> {
        self.limits
            .get(name)
            .map(|max| Partition {
                name: name.to_string(),
                max_walltime_minutes: *max,
            })
            .ok_or_else(|| {
                PlandagError::MissingPartition(format!("partition '{name}' is not declared"))
            })
    }
}
