//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a material (the `material_id` column of ticket events).
///
/// Material ids are assigned by the transactional store, so unlike generated
/// identifiers they are plain integers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(i64);

impl MaterialId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Numeric encoding used when the id is fed to a model as a static feature.
    pub fn as_feature(&self) -> f64 {
        self.0 as f64
    }
}

impl core::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for MaterialId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MaterialId> for i64 {
    fn from(value: MaterialId) -> Self {
        value.0
    }
}

impl FromStr for MaterialId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::invalid_id(format!("MaterialId: {e}")))?;
        Ok(Self(v))
    }
}
