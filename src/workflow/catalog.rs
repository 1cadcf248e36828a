// src/workflow/catalog.rs

//! Logical files, replicas and transformations.
//!
//! The engine resolves a job's inputs by logical name. The replica catalog
//! maps the names that already exist to physical paths; the transformation
//! catalog lists the executables jobs run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::checkpoint::CHECKPOINT_FILE_NAME;
use crate::container::Container;
use crate::errors::{PlandagError, Result};

pub const DEFAULT_SITE: &str = "local";
const BASH_TRANSFORMATION: &str = "bash";
const BASH_PATH: &str = "/bin/bash";
pub const TRANSFORMATION_VERSION: &str = "4.0";

/// A file known to the engine by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalFile {
    name: String,
}

impl LogicalFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaEntry {
    pub lfn: String,
    pub pfn: PathBuf,
    pub site: String,
}

impl ReplicaEntry {
    fn is_checkpoint(&self) -> bool {
        self.pfn
            .file_name()
            .is_some_and(|n| n == CHECKPOINT_FILE_NAME)
    }
}

/// Logical files created so far and which of them already exist.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: BTreeMap<String, LogicalFile>,
    replicas: Vec<ReplicaEntry>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the file for `lfn`, creating it on first use.
    ///
    /// A replica is recorded only when the file is first created and
    /// `register_replica` is set.
    pub fn create_file(
        &mut self,
        lfn: &str,
        pfn: &Path,
        site: Option<&str>,
        register_replica: bool,
    ) -> LogicalFile {
        if let Some(existing) = self.files.get(lfn) {
            return existing.clone();
        }
        let file = LogicalFile::new(lfn);
        self.files.insert(lfn.to_string(), file.clone());
        if register_replica {
            debug!(lfn, pfn = %pfn.display(), "registering replica");
            self.replicas.push(ReplicaEntry {
                lfn: lfn.to_string(),
                pfn: pfn.to_path_buf(),
                site: site.unwrap_or(DEFAULT_SITE).to_string(),
            });
        }
        file
    }

    pub fn get_file(&self, lfn: &str) -> Result<LogicalFile> {
        self.files
            .get(lfn)
            .cloned()
            .ok_or_else(|| PlandagError::UnknownFile(lfn.to_string()))
    }

    pub fn replicas(&self) -> &[ReplicaEntry] {
        &self.replicas
    }

    /// Forget checkpoint replicas after their sentinels were purged.
    pub fn drop_checkpoint_replicas(&mut self) {
        self.replicas.retain(|r| !r.is_checkpoint());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub version: String,
    pub site: String,
    pub pfn: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Executables and registered containers.
#[derive(Debug, Default)]
pub struct TransformationCatalog {
    entries: Vec<TransformationEntry>,
    containers: Vec<Container>,
}

impl TransformationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: TransformationEntry) {
        self.entries.push(entry);
    }

    /// Name of the shared bash transformation for `container`, added on
    /// first use.
    pub fn bash(&mut self, namespace: Option<&str>, site: &str, container: Option<&str>) -> String {
        let name = match container {
            Some(c) => format!("{BASH_TRANSFORMATION}_{}", sanitize(c)),
            None => BASH_TRANSFORMATION.to_string(),
        };
        if !self.entries.iter().any(|e| e.name == name) {
            self.entries.push(TransformationEntry {
                name: name.clone(),
                namespace: namespace.map(str::to_string),
                version: TRANSFORMATION_VERSION.to_string(),
                site: site.to_string(),
                pfn: PathBuf::from(BASH_PATH),
                container: container.map(str::to_string),
            });
        }
        name
    }

    pub fn add_container(&mut self, container: Container) {
        self.containers.push(container);
    }

    pub fn entries(&self) -> &[TransformationEntry] {
        &self.entries
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }
}

/// Replace characters the engine does not accept in transformation names.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
