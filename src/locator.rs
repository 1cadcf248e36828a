// src/locator.rs

//! Hierarchical job names.
//!
//! A [`Locator`] names a job the way a relative path names a file:
//! `jobs/multiply` is the locator with segments `["jobs", "multiply"]`.
//! The same value derives the job's working directory, its display name
//! and the identifier handed to the downstream engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::errors::{PlandagError, Result};

/// Character the downstream engine reserves as a key/value separator.
const FORBIDDEN_CHAR: char = '=';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct Locator {
    parts: Vec<String>,
}

impl Locator {
    /// Build a locator from its segments.
    ///
    /// Fails if there are no segments, a segment is empty, or a segment
    /// contains `=`.
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        validate(&parts)?;
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Append one segment (or a `/`-separated run of segments).
    pub fn join(&self, child: &str) -> Result<Locator> {
        let mut parts = self.parts.clone();
        parts.extend(child.split('/').map(str::to_string));
        Locator::new(parts)
    }

    /// Append all segments of another locator.
    pub fn extend(&self, other: &Locator) -> Locator {
        let mut parts = self.parts.clone();
        parts.extend(other.parts.iter().cloned());
        Locator { parts }
    }

    /// Compose with a dynamically typed value, e.g. a name read from config.
    ///
    /// Strings and arrays of strings are accepted; anything else is an
    /// [`PlandagError::InvalidLocator`].
    pub fn compose(&self, child: &toml::Value) -> Result<Locator> {
        let child = Locator::try_from(child)?;
        Ok(self.extend(&child))
    }

    /// Display name, segments joined with `/`.
    pub fn to_name(&self) -> String {
        self.parts.join("/")
    }

    /// Identifier for the downstream engine: segments joined with `_`,
    /// prefixed with the experiment name when one is set.
    pub fn to_job_id(&self, experiment: Option<&str>) -> String {
        let base = self.parts.join("_");
        match experiment {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}_{base}"),
            _ => base,
        }
    }

    /// `<root>/<seg1>/<seg2>/...`. Does not touch the filesystem.
    pub fn to_working_directory(&self, root: &Path) -> PathBuf {
        self.parts.iter().fold(root.to_path_buf(), |acc, p| acc.join(p))
    }
}

fn validate(parts: &[String]) -> Result<()> {
    if parts.is_empty() {
        return Err(PlandagError::InvalidLocator(
            "a locator needs at least one segment".to_string(),
        ));
    }
    for part in parts {
        if part.is_empty() {
            return Err(PlandagError::InvalidLocator(format!(
                "empty segment in `{}`",
                parts.join("/")
            )));
        }
        if part.contains(FORBIDDEN_CHAR) {
            return Err(PlandagError::InvalidLocator(format!(
                "segment `{part}` contains `{FORBIDDEN_CHAR}`"
            )));
        }
    }
    Ok(())
}

impl FromStr for Locator {
    type Err = PlandagError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::new(s.split('/'))
    }
}

impl TryFrom<&toml::Value> for Locator {
    type Error = PlandagError;

    fn try_from(value: &toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(s) => s.parse(),
            toml::Value::Array(items) => {
                let parts = items
                    .iter()
                    .map(|item| match item {
                        toml::Value::String(s) => Ok(s.clone()),
                        other => Err(PlandagError::InvalidLocator(format!(
                            "cannot use a {} as a locator segment",
                            other.type_str()
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Locator::new(parts)
            }
            other => Err(PlandagError::InvalidLocator(format!(
                "cannot extend a locator with a {}",
                other.type_str()
            ))),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_name())
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_name()
    }
}
