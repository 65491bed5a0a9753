//! Parsing every log of one engine under a directory tree.
//!
//! Logs are independent, so they are parsed on the rayon pool. A log that
//! fails to parse is reported and skipped; it never stops the batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::schema::LogArtifact;
use crate::tables::Tables;
use crate::Engine;

const LOG_TARGET: &str = "batch";

#[derive(Clone, Debug)]
pub struct BatchArgs {
    pub engine: Engine,
    pub root: PathBuf,
    /// File name to look for; the engine's usual log name when `None`.
    pub log_name: Option<String>,
    pub keep: bool,
}

impl BatchArgs {
    pub fn log_name(&self) -> &str {
        self.log_name.as_deref().unwrap_or(self.engine.default_log_name())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Written { log: PathBuf, artifact: PathBuf },
    Failed { log: PathBuf, error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchSummary {
    pub engine: Engine,
    pub root: PathBuf,
    pub written: usize,
    pub failed: usize,
    pub outcomes: Vec<BatchOutcome>,
}

/// Where the artifact for `log` is written: `<log>.json` beside it.
pub fn artifact_path(log: &Path) -> PathBuf {
    let mut name = log.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// Files under `root` named `name`, sorted.
///
/// `root` itself must be a directory. Entries below it that cannot be read
/// are logged and skipped.
pub fn find_logs(root: &Path, name: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{}' is not a directory", root.display()),
        )
        .into());
    }

    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == name {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

fn process(args: &BatchArgs, tables: &Tables, log: &Path) -> Result<PathBuf> {
    let artifact = LogArtifact::from_log_file(args.engine, log, tables, args.keep)?;
    let path = artifact_path(log);
    fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;
    Ok(path)
}

pub fn run(args: &BatchArgs, tables: &Tables) -> Result<BatchSummary> {
    let logs = find_logs(&args.root, args.log_name())?;
    log::info!(
        target: LOG_TARGET,
        "Found {} '{}' log(s) under '{}'",
        logs.len(),
        args.log_name(),
        args.root.display()
    );

    let outcomes: Vec<BatchOutcome> = logs
        .par_iter()
        .map(|path| match process(args, tables, path) {
            Ok(artifact) => {
                log::debug!(target: LOG_TARGET, "Wrote '{}'", artifact.display());
                BatchOutcome::Written {
                    log: path.clone(),
                    artifact,
                }
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping '{}': {e}", path.display());
                BatchOutcome::Failed {
                    log: path.clone(),
                    error: e.to_string(),
                }
            }
        })
        .collect();

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, BatchOutcome::Failed { .. }))
        .count();
    Ok(BatchSummary {
        engine: args.engine,
        root: args.root.clone(),
        written: outcomes.len() - failed,
        failed,
        outcomes,
    })
}
