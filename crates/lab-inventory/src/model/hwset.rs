//! Hardware sets — pools of identical units with a fixed capacity.

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// Longest accepted hardware set identifier.
const MAX_HWSET_ID_LEN: usize = 64;

/// Stable identifier of a hardware set.
///
/// 1–64 characters from `[A-Za-z0-9_.-]`. The restricted alphabet keeps
/// identifiers safe to use as path segments and file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HwSetId(String);

impl HwSetId {
    /// Parse and validate an identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.len() > MAX_HWSET_ID_LEN {
            return Err(InventoryError::InvalidInput(format!(
                "hardware set id must be 1-{MAX_HWSET_ID_LEN} characters, got {}",
                raw.len()
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(InventoryError::InvalidInput(format!(
                "hardware set id {raw:?} contains invalid character {bad:?}"
            )));
        }
        if raw == "." || raw == ".." {
            return Err(InventoryError::InvalidInput(format!(
                "hardware set id {raw:?} is reserved"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HwSetId {
    type Error = InventoryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<HwSetId> for String {
    fn from(id: HwSetId) -> Self {
        id.0
    }
}

impl std::fmt::Display for HwSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a quantity change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityViolation {
    /// `available + delta` would exceed `capacity`.
    ExceedsCapacity,
    /// `available + delta` would go below zero.
    BelowZero,
}

/// A global pool of fungible hardware units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSet {
    pub id: HwSetId,
    pub name: String,
    /// Total units that can ever exist.
    pub capacity: u64,
    /// Units not currently checked out by any project.
    pub available: u64,
}

impl HardwareSet {
    /// A fully stocked hardware set.
    pub fn new(id: HwSetId, name: impl Into<String>, capacity: u64) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            available: capacity,
        }
    }

    /// Same set with a different starting availability.
    pub fn with_available(mut self, available: u64) -> Self {
        self.available = available;
        self
    }

    /// `0 <= available <= capacity`.
    pub fn is_consistent(&self) -> bool {
        self.available <= self.capacity
    }

    /// Units currently checked out across all projects.
    pub fn in_use(&self) -> u64 {
        self.capacity.saturating_sub(self.available)
    }

    /// Availability after applying `delta`, if the result stays in
    /// `0..=capacity`. Does not mutate.
    pub fn adjusted(&self, delta: i64) -> std::result::Result<u64, QuantityViolation> {
        let magnitude = delta.unsigned_abs();
        if delta >= 0 {
            match self.available.checked_add(magnitude) {
                Some(next) if next <= self.capacity => Ok(next),
                _ => Err(QuantityViolation::ExceedsCapacity),
            }
        } else {
            self.available
                .checked_sub(magnitude)
                .ok_or(QuantityViolation::BelowZero)
        }
    }
}
