//! The lookup tables that drive normalization, bundled as one immutable value.
//!
//! Built once at startup (compiled-in defaults or a JSON file) and passed by
//! reference into [`normalize`](crate::normalize::normalize).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crosswalk::{CanonicalSet, NameCrosswalk};
use crate::error::{Error, Result};
use crate::units::UnitRegistry;

const LOG_TARGET: &str = "tables";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tables {
    units: UnitRegistry,
    crosswalk: NameCrosswalk,
    canonical: CanonicalSet,
}

/// On-disk shape of a tables file; validated through [`Tables::new`].
#[derive(Deserialize)]
struct TablesFile {
    units: UnitRegistry,
    #[serde(default)]
    crosswalk: NameCrosswalk,
    #[serde(default = "CanonicalSet::builtin")]
    canonical: CanonicalSet,
}

impl Tables {
    /// Checks the table invariants: canonical names are distinct and have a
    /// registered unit, and every crosswalk target is a canonical name.
    pub fn new(units: UnitRegistry, crosswalk: NameCrosswalk, canonical: CanonicalSet) -> Result<Self> {
        let distinct = CanonicalSet::new(canonical.iter());
        if distinct.len() != canonical.len() {
            return Err(Error::InvalidTables("canonical names must be distinct".into()));
        }
        if let Some(name) = canonical.iter().find(|name| !units.contains(name)) {
            return Err(Error::InvalidTables(format!("canonical metric '{name}' has no unit")));
        }
        if let Some((raw, target)) = crosswalk.iter().find(|(_, target)| !canonical.contains(target)) {
            return Err(Error::InvalidTables(format!(
                "crosswalk maps '{raw}' to '{target}', which is not a canonical metric"
            )));
        }

        Ok(Self {
            units,
            crosswalk,
            canonical,
        })
    }

    /// The compiled-in tables, checked like any loaded set.
    pub fn builtin() -> Self {
        Self::new(UnitRegistry::builtin(), NameCrosswalk::builtin(), CanonicalSet::builtin())
            .expect("built-in tables are consistent")
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: TablesFile = serde_json::from_str(json)?;
        Self::new(file.units, file.crosswalk, file.canonical)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!(target: LOG_TARGET, "Loading tables from '{}'", path.display());
        let tables = Self::from_json_str(&fs::read_to_string(path)?)?;
        log::info!(
            target: LOG_TARGET,
            "Loaded {} units, {} canonical metrics from '{}'",
            tables.units.len(),
            tables.canonical.len(),
            path.display()
        );
        Ok(tables)
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn crosswalk(&self) -> &NameCrosswalk {
        &self.crosswalk
    }

    pub fn canonical(&self) -> &CanonicalSet {
        &self.canonical
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::builtin()
    }
}
