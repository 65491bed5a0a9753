//! GROMACS `md.log` parser.
//!
//! GROMACS writes several loosely formatted sections; each gets its own
//! state. Anything outside a recognised section is scanned for the section
//! headers and a few one-line facts (atom count, performance).

use serde_json::Value;

use super::{check_error_marker, table_row, ParsedLog};
use crate::error::Result;

const ENGINE: &str = "GROMACS";
const ERROR_MARKER: &str = "Fatal error:";

pub const INFO_BLOCK: &str = "Gromacs info";
pub const INFILE_BLOCK: &str = "Infile";
pub const MEGAFLOPS_BLOCK: &str = "Megaflops";
pub const CYCLES_BLOCK: &str = "Cycles";

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Scan,
    /// `GROMACS version: ...` up to the first blank line.
    Header,
    InputParameters,
    /// M-Flops accounting, with the column names from its header.
    Megaflops(Vec<String>),
    /// Cycle accounting before the second header line naming the columns.
    CyclesHeader,
    Cycles(Vec<String>),
    /// Saw `(ns/day) (hour/ns)`; the next `Performance:` line has the values.
    Performance,
}

pub fn parse(text: &str) -> Result<ParsedLog> {
    let mut out = ParsedLog::default();
    for name in [INFO_BLOCK, MEGAFLOPS_BLOCK, CYCLES_BLOCK, INFILE_BLOCK] {
        let _ = out.block(name);
    }

    let mut state = State::Scan;
    for (line_no, raw) in text.lines().enumerate() {
        check_error_marker(ENGINE, ERROR_MARKER, line_no, raw)?;
        let line = raw.trim();
        if line.contains("------") {
            continue;
        }
        if line.contains("There are:") {
            if let Some(atoms) = line.split_whitespace().nth(2) {
                out.set_total("Atoms", atoms);
            }
        }

        state = step(&mut out, state, line);
    }

    Ok(out)
}

fn step(out: &mut ParsedLog, state: State, line: &str) -> State {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match state {
        State::Scan => scan(out, line),
        State::Header => {
            if line.is_empty() {
                return State::Scan;
            }
            if let Some((key, value)) = line.split_once(':') {
                let _ = out
                    .block(INFO_BLOCK)
                    .insert(key.trim().to_string(), Value::from(value.trim()));
            }
            State::Header
        }
        State::InputParameters => match line.split_once('=') {
            Some((key, value)) => {
                let (key, value) = (key.trim(), value.trim());
                match key {
                    "dt" => out.set_total("Timestep", value),
                    "nsteps" => out.set_total("Steps", value),
                    _ => {}
                }
                let _ = out.block(INFILE_BLOCK).insert(key.to_string(), Value::from(value));
                State::InputParameters
            }
            // The parameter list ends at the first line that is not `key = value`.
            None => scan(out, line),
        },
        State::Megaflops(cols) => {
            if line.is_empty() {
                return State::Scan;
            }
            if tokens.first() == Some(&"Total") {
                if let Some(total) = tokens.get(1) {
                    out.set_total("Mflops", *total);
                }
            } else if let Some((label, row)) = table_row(&tokens, &cols) {
                let _ = out.block(MEGAFLOPS_BLOCK).insert(label, Value::Object(row));
            }
            State::Megaflops(cols)
        }
        State::CyclesHeader => {
            if line.contains("(s)") {
                State::Cycles(cycle_columns(&tokens))
            } else {
                State::CyclesHeader
            }
        }
        State::Cycles(cols) => {
            if tokens.first() == Some(&"Total") {
                if let (Some(wall), Some(cycles)) = (tokens.get(1), tokens.get(2)) {
                    out.set_total("Wall time (s)", *wall);
                    out.set_total("Giga-Cycles", *cycles);
                }
                return State::Scan;
            }
            if let Some((label, row)) = table_row(&tokens, &cols) {
                let _ = out.block(CYCLES_BLOCK).insert(label, Value::Object(row));
            }
            State::Cycles(cols)
        }
        State::Performance => {
            if tokens.first() != Some(&"Performance:") {
                return State::Performance;
            }
            if let (Some(ns_day), Some(hour_ns)) = (tokens.get(1), tokens.get(2)) {
                out.set_total("ns/day", *ns_day);
                out.set_total("hour/ns", *hour_ns);
            }
            State::Scan
        }
    }
}

fn scan(out: &mut ParsedLog, line: &str) -> State {
    if line.contains("GROMACS version:") {
        return step(out, State::Header, line);
    }
    if line.contains("Input Parameters:") {
        return State::InputParameters;
    }
    if line.contains("Computing:") && line.contains("M-Number") {
        return State::Megaflops(megaflops_columns(line));
    }
    if line.contains("Computing:") && line.contains("Giga-Cycles") {
        return State::CyclesHeader;
    }
    if line.contains("(ns/day)") {
        return State::Performance;
    }
    State::Scan
}

/// `Computing: M-Number M-Flops % Flops` -> `[M-Number, M-Flops, % Flops]`
fn megaflops_columns(line: &str) -> Vec<String> {
    let mut cols = Vec::new();
    let mut tokens = line.split_whitespace().filter(|t| *t != "Computing:");
    while let Some(token) = tokens.next() {
        if token == "%" {
            if let Some(next) = tokens.next() {
                cols.push(format!("% {next}"));
                continue;
            }
        }
        cols.push(token.to_string());
    }
    cols
}

/// `Ranks Threads Count (s) total sum %` -> readable column names.
fn cycle_columns(tokens: &[&str]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| **t != "sum")
        .map(|t| match *t {
            "Count" => "Calls".to_string(),
            "(s)" => "Wall time (s)".to_string(),
            "total" => "Giga-cycles (total)".to_string(),
            "%" => "% Runtime".to_string(),
            other => other.to_string(),
        })
        .collect()
}
