use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::normalize::{normalize_value, CanonicalMetrics, RawMetrics};
use crate::parsers::EnergySeries;
use crate::tables::Tables;
use crate::Engine;

pub const SCHEMA_VERSION: u32 = 1;

const RUN_BLOCK: &str = "Run";
const TOTALS_BLOCK: &str = "Totals";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub tool_version: String,
    pub engine: String,
    pub source: String,
    pub source_sha256: String,
    pub timestamp_utc: String,
}

impl RunMeta {
    pub fn new(engine: Engine, source: &Path, contents: &[u8]) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            engine: engine.as_str().to_string(),
            source: source.display().to_string(),
            source_sha256: hex32(Sha256::digest(contents).into()),
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// `Totals` as written out: normalized, or the parser's raw block (`--keep`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Totals {
    Canonical(CanonicalMetrics),
    Raw(RawMetrics),
}

/// One parsed log, as written to `<log>.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogArtifact {
    #[serde(rename = "Run")]
    pub run: RunMeta,
    #[serde(flatten)]
    pub blocks: Map<String, Value>,
    #[serde(rename = "Totals")]
    pub totals: Totals,
}

impl LogArtifact {
    pub fn from_log_file<P: AsRef<Path>>(engine: Engine, path: P, tables: &Tables, keep: bool) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)?;
        let parsed = engine.parse(&String::from_utf8_lossy(&contents))?;

        let totals = if keep {
            Totals::Raw(parsed.totals)
        } else {
            Totals::Canonical(crate::normalize(&parsed.totals, tables)?)
        };
        Ok(Self {
            run: RunMeta::new(engine, path, &contents),
            blocks: parsed.blocks,
            totals,
        })
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Per-step energies of one log, kept as the raw strings the engine printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyArtifact {
    #[serde(rename = "Run")]
    pub run: RunMeta,
    #[serde(rename = "Energies")]
    pub energies: EnergySeries,
}

impl EnergyArtifact {
    pub fn from_log_file<P: AsRef<Path>>(engine: Engine, path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)?;
        let energies = engine.parse_energies(&String::from_utf8_lossy(&contents))?;
        Ok(Self {
            run: RunMeta::new(engine, path, &contents),
            energies,
        })
    }
}

/// Replaces the `Totals` of an artifact with its normalized form.
///
/// An object without a `Totals` key is taken to be a bare totals block and
/// is normalized as a whole.
pub fn normalize_artifact(artifact: Value, tables: &Tables) -> Result<Value> {
    match artifact {
        Value::Object(mut blocks) if blocks.contains_key(TOTALS_BLOCK) => {
            let canonical = normalize_value(&blocks[TOTALS_BLOCK], tables)?;
            let _ = blocks.insert(TOTALS_BLOCK.to_string(), serde_json::to_value(canonical)?);
            if let Some(Value::Object(run)) = blocks.get_mut(RUN_BLOCK) {
                let _ = run.insert("tool_version".to_string(), Value::from(env!("CARGO_PKG_VERSION")));
            }
            Ok(Value::Object(blocks))
        }
        bare => Ok(serde_json::to_value(normalize_value(&bare, tables)?)?),
    }
}

fn hex32(d: [u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in d {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
