//! Merging per-run JSON files, and small ad-hoc metadata objects.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

const LOG_TARGET: &str = "collate";

/// Key of the collation format version in merged output.
pub const VERSION_KEY: &str = "version";

/// Key a file is filed under: its path with `.json` removed.
pub fn collate_key(path: &Path) -> String {
    let path = path.display().to_string();
    path.strip_suffix(".json").unwrap_or(&path).to_string()
}

/// Merges JSON files into one object keyed by [`collate_key`].
pub fn collate<P: AsRef<Path>>(paths: &[P]) -> Result<Value> {
    let mut out = Map::new();
    for path in paths {
        let path = path.as_ref();
        log::debug!(target: LOG_TARGET, "Collating '{}'", path.display());
        let contents: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        if out.insert(collate_key(path), contents).is_some() {
            log::warn!(target: LOG_TARGET, "'{}' given more than once", path.display());
        }
    }
    let _ = out.insert(VERSION_KEY.to_string(), Value::from(env!("CARGO_PKG_VERSION")));
    Ok(Value::Object(out))
}

/// Deletes collated inputs once the merged file is safely written.
pub fn remove_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => {}
            // Repeated arguments name the same file twice.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        log::debug!(target: LOG_TARGET, "Removed '{}'", path.display());
    }
    Ok(())
}

/// Builds an object from `key:value` pairs. Values stay strings; the first
/// `:` separates key from value.
pub fn extra<S: AsRef<str>>(pairs: &[S]) -> Result<Value> {
    let mut out = Map::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| Error::parse(format!("expected 'key:value', got '{pair}'")))?;
        let _ = out.insert(key.to_string(), Value::from(value));
    }
    Ok(Value::Object(out))
}
