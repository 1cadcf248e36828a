// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every variant is a construction-time failure: the builder reports it at
//! the call that detects it and never retries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlandagError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Locator '{locator}' is already used by job {job_id}")]
    DuplicateLocator { locator: String, job_id: String },

    #[error("Invalid dependency specification: {0}")]
    DependencySpecification(String),

    #[error("Missing partition: {0}")]
    MissingPartition(String),

    #[error(
        "Job {job} requests {requested} minutes but partition '{partition}' allows at most {max}"
    )]
    WalltimeExceeded {
        job: String,
        partition: String,
        requested: u32,
        max: u32,
    },

    #[error("Inconsistent node constraint: {0}")]
    InconsistentNodeConstraint(String),

    #[error("Cannot unify a {base} resource request with a {other} resource request")]
    IncompatibleResourceRequest {
        base: &'static str,
        other: &'static str,
    },

    #[error("Invalid resource request: {0}")]
    InvalidResourceRequest(String),

    #[error("Container job {job} maps more than one file named '{name}'")]
    DuplicateContainerFileName { job: String, name: String },

    #[error("Unknown container type '{0}' (expected docker, singularity or shifter)")]
    UnknownContainerType(String),

    #[error("Service '{0}' was never scheduled to start")]
    StaleServiceReference(String),

    #[error("Invalid key-value store operation: {0}")]
    InvalidKeyValueOperation(String),

    #[error("Logical file '{0}' was never created")]
    UnknownFile(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlandagError>;
