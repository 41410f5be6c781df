//! Graph configuration.
//!
//! Defaults used when valued edges are created from a bare target
//! (see `Graph::valued`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{Quantity, StateOfMatter};
use crate::{Error, Result};

/// Tunables of a `Graph`. Every field has a default; a JSON document only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Quantity given to new edges when none is specified.
    pub default_quantity: Quantity,
    /// State used when a matter target is missing its own default.
    pub default_state: StateOfMatter,
    /// Thickness of new cover edges.
    pub default_thickness: f64,
    /// Largest number of units one personal element edge may add to a
    /// chemical formula.
    pub max_formula_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_quantity: Quantity::exact(1.0),
            default_state: StateOfMatter::Solid,
            default_thickness: 0.0,
            max_formula_count: 10_000,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.default_thickness.is_finite() || self.default_thickness < 0.0 {
            return Err(Error::ConfigError(format!(
                "default_thickness must be finite and non-negative, got {}",
                self.default_thickness
            )));
        }
        if self.max_formula_count == 0 {
            return Err(Error::ConfigError("max_formula_count must be at least 1".into()));
        }
        Ok(())
    }
}
