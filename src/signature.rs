// src/signature.rs

//! Content signatures for job deduplication.
//!
//! Two scheduling calls with the same program and the same canonical
//! arguments produce the same [`JobSignature`]; the builder then returns
//! the node it already created instead of adding a second job.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::artifact::DependencyNode;
use crate::errors::Result;
use crate::parameters::Parameters;

/// What a Python job runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Program {
    /// A fully-qualified module, run as `python -m <module>`.
    Module(String),
    /// A script on disk.
    Script(PathBuf),
}

impl Program {
    pub fn module(name: &str) -> Self {
        Program::Module(name.to_string())
    }

    pub fn script(path: impl Into<PathBuf>) -> Self {
        Program::Script(path.into())
    }

    /// Stable identity string; part of the job signature.
    pub fn identity(&self) -> String {
        match self {
            Program::Module(m) => format!("module:{m}"),
            Program::Script(p) => format!("script:{}", p.display()),
        }
    }

    /// Arguments that follow the interpreter on the command line.
    pub fn invocation(&self) -> String {
        match self {
            Program::Module(m) => format!("-m {m}"),
            Program::Script(p) => p.display().to_string(),
        }
    }
}

/// The arguments half of a signature.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentPayload {
    Args(String),
    Parameters(Parameters),
}

impl ArgumentPayload {
    /// Deterministic text for hashing.
    pub fn canonical(&self) -> Result<String> {
        match self {
            ArgumentPayload::Args(args) => Ok(args.clone()),
            ArgumentPayload::Parameters(params) => params.to_toml(),
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            ArgumentPayload::Args(_) => "args",
            ArgumentPayload::Parameters(_) => "params",
        }
    }
}

/// BLAKE3 digest of a program identity and its canonical arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobSignature(String);

impl JobSignature {
    pub fn compute(program_identity: &str, payload: &ArgumentPayload) -> Result<Self> {
        let canonical = payload.canonical()?;
        Ok(Self::from_fields(&[program_identity, payload.tag(), &canonical]))
    }

    /// Each field is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
    pub fn from_fields(fields: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        JobSignature(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signature -> node already scheduled for it.
#[derive(Debug, Default)]
pub struct SignatureCache {
    nodes: HashMap<JobSignature, DependencyNode>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &JobSignature) -> Option<&DependencyNode> {
        self.nodes.get(signature)
    }

    pub fn insert(&mut self, signature: JobSignature, node: DependencyNode) {
        self.nodes.insert(signature, node);
    }
}
