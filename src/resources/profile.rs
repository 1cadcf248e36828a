use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::PlandagError;
use crate::types::ProfileNamespace;

/// One `namespace.key = value` setting the engine applies to a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Profile {
    pub namespace: ProfileNamespace,
    pub key: String,
    pub value: String,
}

impl Profile {
    pub fn new(namespace: ProfileNamespace, key: &str, value: &str) -> Self {
        Self {
            namespace,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Build from a namespace name such as `"pegasus"`.
    pub fn parse(namespace: &str, key: &str, value: &str) -> Result<Self, PlandagError> {
        let namespace = ProfileNamespace::from_str(namespace).map_err(PlandagError::ConfigError)?;
        Ok(Self::new(namespace, key, value))
    }
}

/// The engine-specific settings attached to one job.
///
/// Later writes to the same `(namespace, key)` replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionProfile {
    entries: BTreeMap<ProfileNamespace, BTreeMap<String, String>>,
}

impl ExecutionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, namespace: ProfileNamespace, key: &str, value: impl Into<String>) {
        self.entries
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn add(&mut self, profile: &Profile) {
        self.set(profile.namespace, &profile.key, profile.value.clone());
    }

    pub fn get(&self, namespace: ProfileNamespace, key: &str) -> Option<&str> {
        self.entries
            .get(&namespace)
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    /// The concurrency-limit category, if one was assigned.
    pub fn category(&self) -> Option<&str> {
        self.get(ProfileNamespace::Dagman, "category")
    }
}

impl Serialize for ExecutionProfile {
    /// Namespaces become plain string keys.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.entries
                .iter()
                .map(|(namespace, settings)| (namespace.to_string(), settings)),
        )
    }
}
