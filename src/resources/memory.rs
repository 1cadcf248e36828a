use std::fmt;
use std::str::FromStr;

use crate::errors::{PlandagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryUnit {
    Kibibytes,
    Mebibytes,
    Gibibytes,
    Tebibytes,
}

impl MemoryUnit {
    fn suffix(self) -> &'static str {
        match self {
            MemoryUnit::Kibibytes => "K",
            MemoryUnit::Mebibytes => "M",
            MemoryUnit::Gibibytes => "G",
            MemoryUnit::Tebibytes => "T",
        }
    }
}

/// An amount of memory with its unit, e.g. `2G` or `512M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryAmount {
    amount: u64,
    unit: MemoryUnit,
}

impl MemoryAmount {
    pub fn new(amount: u64, unit: MemoryUnit) -> Self {
        Self { amount, unit }
    }

    pub fn gibibytes(amount: u64) -> Self {
        Self::new(amount, MemoryUnit::Gibibytes)
    }

    pub fn mebibytes(amount: u64) -> Self {
        Self::new(amount, MemoryUnit::Mebibytes)
    }

    /// SLURM `--mem` syntax.
    pub fn to_slurm_string(&self) -> String {
        format!("{}{}", self.amount, self.unit.suffix())
    }

    /// Saturates at `u64::MAX` for absurdly large amounts.
    pub fn as_mebibytes(&self) -> u64 {
        match self.unit {
            MemoryUnit::Kibibytes => self.amount / 1024,
            MemoryUnit::Mebibytes => self.amount,
            MemoryUnit::Gibibytes => self.amount.saturating_mul(1024),
            MemoryUnit::Tebibytes => self.amount.saturating_mul(1024 * 1024),
        }
    }
}

impl FromStr for MemoryAmount {
    type Err = PlandagError;

    /// Accepts `<digits>[ ]<K|M|G|T>[B]`, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, rest) = trimmed.split_at(split);

        let amount: u64 = digits.parse().map_err(|_| {
            PlandagError::InvalidResourceRequest(format!("cannot parse memory amount `{s}`"))
        })?;

        let unit = match rest.trim().to_uppercase().trim_end_matches('B') {
            "K" => MemoryUnit::Kibibytes,
            "M" => MemoryUnit::Mebibytes,
            "G" => MemoryUnit::Gibibytes,
            "T" => MemoryUnit::Tebibytes,
            _ => {
                return Err(PlandagError::InvalidResourceRequest(format!(
                    "unknown memory unit in `{s}` (expected K, M, G or T)"
                )));
            }
        };

        Ok(MemoryAmount { amount, unit })
    }
}

impl fmt::Display for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_slurm_string())
    }
}
