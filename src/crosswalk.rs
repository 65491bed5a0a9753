//! Name crosswalk and the canonical metric vocabulary.
//!
//! Engines name the same quantity differently (`Elapsed(s)`, `Wall time (s)`,
//! `CPU Time (s)`). The crosswalk folds those onto one canonical name so
//! results from different programs can be compared side by side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw metric name -> canonical metric name. Names not listed are taken to be
/// canonical already.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameCrosswalk {
    names: BTreeMap<String, String>,
}

impl NameCrosswalk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw: impl Into<String>, canonical: impl Into<String>) {
        let _ = self.names.insert(raw.into(), canonical.into());
    }

    pub fn resolve<'a>(&'a self, raw: &'a str) -> &'a str {
        self.names.get(raw).map_or(raw, String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn builtin() -> Self {
        const NAMES: &[(&str, &str)] = &[
            ("Wall time (s)", "Wall Clock Time (s)"),
            ("Elapsed(s)", "Wall Clock Time (s)"),
            ("CPU Time (s)", "Wall Clock Time (s)"),
            ("timesteps/s", "step/s"),
            ("timesteps/s,", "step/s"),
            ("Steps/second", "step/s"),
            ("Steps/s", "step/s"),
            ("seconds/ns", "s/ns"),
            ("days/ns", "day/ns"),
            ("Atoms", "Number of atoms"),
            ("Per Step(ms)", "s/step"),
        ];

        let mut crosswalk = Self::new();
        for &(raw, canonical) in NAMES {
            crosswalk.insert(raw, canonical);
        }
        crosswalk
    }
}

pub const WALL_CLOCK_TIME: &str = "Wall Clock Time (s)";
pub const NUMBER_OF_ATOMS: &str = "Number of atoms";
pub const STEP_PER_S: &str = "step/s";
pub const NS_PER_S: &str = "ns/s";
pub const NS_PER_DAY: &str = "ns/day";
pub const S_PER_STEP: &str = "s/step";
pub const S_PER_NS: &str = "s/ns";
pub const DAY_PER_NS: &str = "day/ns";

/// Raw metric carrying the step count used to derive `step/s`.
pub const STEPS: &str = "Steps";

/// The ordered set of names every normalized Totals block carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSet {
    names: Vec<String>,
}

impl CanonicalSet {
    /// Builds a set from `names`, dropping repeats after the first occurrence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    pub fn builtin() -> Self {
        Self::new([
            WALL_CLOCK_TIME,
            NUMBER_OF_ATOMS,
            STEP_PER_S,
            NS_PER_S,
            NS_PER_DAY,
            S_PER_STEP,
            S_PER_NS,
            DAY_PER_NS,
        ])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Swaps numerator and denominator: `ns/day` -> `day/ns`.
///
/// Returns `None` for names without a `/`. Names with several separators are
/// reversed segment by segment.
pub fn reciprocal_name(name: &str) -> Option<String> {
    if !name.contains('/') {
        return None;
    }
    let parts: Vec<&str> = name.split('/').rev().collect();
    Some(parts.join("/"))
}
