//! LAMMPS `log.lammps` parser.
//!
//! A log holds one `Performance:` line and one `MPI task timing breakdown`
//! table per `run` command. All of them are kept; the last performance line
//! is the one normalized as the run's totals.

use serde_json::{Map, Value};

use super::{check_error_marker, ParsedLog};
use crate::error::Result;

const ENGINE: &str = "LAMMPS";
const ERROR_MARKER: &str = "ERROR:";

pub const PERFORMANCE_BLOCK: &str = "Performance";
pub const BREAKDOWNS_BLOCK: &str = "Breakdowns";

/// `value unit` pairs taken from each performance line.
const PERFORMANCE_PAIRS: usize = 3;

#[derive(Debug)]
enum State {
    Scan,
    Breakdown(Vec<Vec<String>>),
}

pub fn parse(text: &str) -> Result<ParsedLog> {
    let mut performance: Vec<Map<String, Value>> = Vec::new();
    let mut breakdowns: Vec<Map<String, Value>> = Vec::new();

    let mut state = State::Scan;
    for (line_no, line) in text.lines().enumerate() {
        check_error_marker(ENGINE, ERROR_MARKER, line_no, line)?;

        state = match state {
            State::Scan if line.contains("breakdown") => State::Breakdown(Vec::new()),
            State::Breakdown(mut rows) if line.contains('|') => {
                rows.push(line.split('|').map(|cell| cell.trim().to_string()).collect());
                State::Breakdown(rows)
            }
            State::Breakdown(rows) if !line.contains("---") => {
                breakdowns.push(breakdown_table(rows));
                State::Scan
            }
            other => other,
        };

        if line.trim_start().starts_with("Performance:") {
            performance.push(performance_line(line));
        }
    }
    if let State::Breakdown(rows) = state {
        breakdowns.push(breakdown_table(rows));
    }

    let mut out = ParsedLog::default();
    if let Some(last) = performance.last() {
        out.totals = last.clone();
    }
    let _ = out.blocks.insert(
        PERFORMANCE_BLOCK.to_string(),
        Value::Array(performance.into_iter().map(Value::Object).collect()),
    );
    let _ = out.blocks.insert(
        BREAKDOWNS_BLOCK.to_string(),
        Value::Array(breakdowns.into_iter().map(Value::Object).collect()),
    );
    Ok(out)
}

/// `Performance: 2.391 ns/day, 10.038 hours/ns, 27.674 timesteps/s`
fn performance_line(line: &str) -> Map<String, Value> {
    let tokens: Vec<&str> = line.split_whitespace().skip(1).collect();
    tokens
        .chunks_exact(2)
        .take(PERFORMANCE_PAIRS)
        .map(|pair| (pair[1].trim_end_matches(',').to_string(), Value::from(pair[0])))
        .collect()
}

/// First row names the columns; every other row is `name | values...`.
fn breakdown_table(rows: Vec<Vec<String>>) -> Map<String, Value> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Map::new();
    };
    let labels = &header[1..];

    rows.filter_map(|mut row| {
        if row.is_empty() {
            return None;
        }
        let name = row.remove(0);
        let cells: Map<String, Value> = labels.iter().cloned().zip(row.into_iter().map(Value::from)).collect();
        Some((name, Value::Object(cells)))
    })
    .collect()
}
