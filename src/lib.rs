use clap::ValueEnum;
use serde::Serialize;

pub mod batch;
pub mod coerce;
pub mod collate;
pub mod crosswalk;
pub mod error;
pub mod normalize;
pub mod parsers;
pub mod schema;
pub mod tables;
pub mod units;

pub use error::{Error, Result};
pub use normalize::{normalize, CanonicalMetrics, RawMetrics};
pub use parsers::{EnergySeries, ParsedLog};
pub use tables::Tables;

/// Simulation engine whose log is being read.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// AMBER `mdout` (pmemd / sander).
    Amber,
    /// GROMACS `md.log`.
    Gromacs,
    /// NAMD standard output.
    Namd,
    /// LAMMPS `log.lammps`.
    Lammps,
    /// JSON metrics written by the OpenMM benchmark scripts.
    Openmm,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Amber => "amber",
            Engine::Gromacs => "gromacs",
            Engine::Namd => "namd",
            Engine::Lammps => "lammps",
            Engine::Openmm => "openmm",
        }
    }

    /// File name the engine writes its log under by default.
    pub fn default_log_name(&self) -> &'static str {
        match self {
            Engine::Amber => "mdout",
            Engine::Gromacs => "md.log",
            Engine::Namd => "namd.log",
            Engine::Lammps => "log.lammps",
            Engine::Openmm => "omm.json",
        }
    }

    pub fn parse(&self, text: &str) -> Result<ParsedLog> {
        match self {
            Engine::Amber => parsers::amber::parse(text),
            Engine::Gromacs => parsers::gromacs::parse(text),
            Engine::Namd => parsers::namd::parse(text),
            Engine::Lammps => parsers::lammps::parse(text),
            Engine::Openmm => parsers::openmm::parse(text),
        }
    }

    /// Per-step energy terms. Only AMBER and NAMD logs carry them.
    pub fn parse_energies(&self, text: &str) -> Result<EnergySeries> {
        match self {
            Engine::Amber => parsers::amber::parse_energies(text),
            Engine::Namd => parsers::namd::parse_energies(text),
            Engine::Gromacs | Engine::Lammps | Engine::Openmm => Err(Error::parse(format!(
                "energy series are not read from {} logs",
                self.as_str()
            ))),
        }
    }
}
