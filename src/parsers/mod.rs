//! Line-oriented parsers for the logs written by each MD engine.
//!
//! Every parser walks its log once, driven by an explicit state enum, and
//! returns the auxiliary blocks it found (input parameters, timing tables)
//! plus the raw `Totals` block that feeds [`normalize`](crate::normalize).
//! AMBER and NAMD logs also carry per-step energies, read separately into an
//! [`EnergySeries`].

pub mod amber;
pub mod gromacs;
pub mod lammps;
pub mod namd;
pub mod openmm;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::normalize::RawMetrics;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedLog {
    /// Pass-through blocks, in the order they were first seen.
    pub blocks: Map<String, Value>,
    pub totals: RawMetrics,
}

impl ParsedLog {
    /// Object-valued block `name`, created empty on first use.
    fn block(&mut self, name: &str) -> &mut Map<String, Value> {
        let entry = self
            .blocks
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("block was just made an object"),
        }
    }

    fn set_total(&mut self, name: &str, value: impl Into<Value>) {
        let _ = self.totals.insert(name.to_string(), value.into());
    }
}

/// Per-step energy terms: term name -> array of raw values, in log order.
pub type EnergySeries = Map<String, Value>;

fn push_sample(series: &mut EnergySeries, term: &str, value: &str) {
    let entry = series.entry(term.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(values) = entry {
        values.push(Value::from(value));
    }
}

/// Fails if `line` carries the engine's own error marker.
fn check_error_marker(engine: &str, marker: &str, line_no: usize, line: &str) -> Result<()> {
    if line.contains(marker) {
        return Err(Error::parse(format!(
            "{engine} log reports an error at line {}: {}",
            line_no + 1,
            line.trim()
        )));
    }
    Ok(())
}

/// The token `offset` places away from the first occurrence of `word`.
fn word_near<'a>(tokens: &[&'a str], word: &str, offset: isize) -> Option<&'a str> {
    let at = tokens.iter().position(|t| *t == word)?;
    let idx = at.checked_add_signed(offset)?;
    tokens.get(idx).copied()
}

fn looks_numeric(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

/// Splits a table row into a label and the values under `cols`.
///
/// Values are aligned to the right-hand columns, so rows that leave leading
/// columns blank (GROMACS' `Rest` row) still line up. The label is everything
/// before the numeric tail.
fn table_row(tokens: &[&str], cols: &[String]) -> Option<(String, Map<String, Value>)> {
    let tail = tokens.iter().rev().take_while(|t| looks_numeric(t)).count().min(cols.len());
    let split = tokens.len() - tail;
    if split == 0 || tail == 0 {
        return None;
    }
    let label = tokens[..split].join(" ");
    let row = cols[cols.len() - tail..]
        .iter()
        .zip(&tokens[split..])
        .map(|(c, v)| (c.clone(), Value::from(*v)))
        .collect();
    Some((label, row))
}
