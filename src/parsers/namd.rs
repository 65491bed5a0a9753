//! NAMD stdout parser.
//!
//! NAMD has no sectioned summary; the figures are spread over single lines:
//!
//! ```text
//! Info: 92224 ATOMS
//! Info: Finished startup at 3.5 s, 400 MB of memory in use
//! Info: Benchmark time: 8 CPUs 0.0123 s/step 0.142 days/ns 512 MB memory
//! WallClock: 59.5  CPUTime: 59.1  Memory: 612 MB
//! ```
//!
//! Benchmark lines repeat and are averaged. The `ETITLE:`/`ENERGY:` thermo
//! rows are read by [`parse_energies`].

use super::{check_error_marker, push_sample, word_near, EnergySeries, ParsedLog};
use crate::error::{Error, Result};

const ENGINE: &str = "NAMD";
const ERROR_MARKER: &str = "FATAL ERROR";

/// Position in the run: NAMD prints its setup report, then benchmark lines
/// while dynamics run, then a closing `WallClock:` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Startup,
    Running,
    Finished,
}

#[derive(Debug, Default)]
struct Figures {
    s_per_step: Vec<f64>,
    ns_per_day: Vec<f64>,
    days_per_ns: Vec<f64>,
    wall_clock: Option<f64>,
    cpu_time: Option<String>,
    startup: Option<f64>,
    atoms: Option<String>,
}

fn number(token: Option<&str>, what: &str, line_no: usize) -> Result<f64> {
    let token = token.ok_or_else(|| Error::parse(format!("{ENGINE}: no {what} on line {}", line_no + 1)))?;
    token
        .parse()
        .map_err(|_| Error::parse(format!("{ENGINE}: bad {what} '{token}' on line {}", line_no + 1)))
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Reads the benchmark figures. `Benchmark time` and `WallClock:` lines are
/// required; the atom count and startup time are optional.
pub fn parse(text: &str) -> Result<ParsedLog> {
    let mut figures = Figures::default();

    let mut state = State::Startup;
    for (line_no, line) in text.lines().enumerate() {
        check_error_marker(ENGINE, ERROR_MARKER, line_no, line)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        state = match state {
            State::Startup | State::Running if line.contains("Benchmark time") => {
                figures.read_benchmark(&tokens, line_no)?;
                State::Running
            }
            State::Startup | State::Running if line.contains("WallClock:") => {
                figures.wall_clock = Some(number(word_near(&tokens, "WallClock:", 1), "wall clock", line_no)?);
                figures.cpu_time = word_near(&tokens, "CPUTime:", 1).map(str::to_string);
                State::Finished
            }
            State::Startup if line.contains("Finished startup") => {
                figures.startup = Some(number(word_near(&tokens, "at", 1), "startup time", line_no)?);
                State::Running
            }
            State::Startup => {
                // `Info: 0 FIXED ATOMS` shares the keyword; only a bare count qualifies.
                if let [_, count, "ATOMS"] = tokens[..] {
                    if count.parse::<u64>().is_ok() {
                        figures.atoms = Some(count.to_string());
                    }
                }
                State::Startup
            }
            other => other,
        };
    }

    figures.into_parsed()
}

/// Thermo reader state: columns are unknown until the first `ETITLE:` row.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ThermoState {
    Untitled,
    Rows(Vec<String>),
}

/// Reads the `ENERGY:` rows into one array per `ETITLE:` column.
///
/// The leading `ETITLE:`/`ENERGY:` label is not a column. Repeated title
/// rows keep the first set of columns.
pub fn parse_energies(text: &str) -> Result<EnergySeries> {
    let mut series = EnergySeries::new();

    let mut state = ThermoState::Untitled;
    for (line_no, line) in text.lines().enumerate() {
        check_error_marker(ENGINE, ERROR_MARKER, line_no, line)?;
        let mut tokens = line.split_whitespace();

        state = match (state, tokens.next()) {
            (ThermoState::Untitled, Some("ETITLE:")) => {
                let mut columns: Vec<String> = Vec::new();
                for name in tokens {
                    if !columns.iter().any(|c| c == name) {
                        columns.push(name.to_string());
                    }
                }
                ThermoState::Rows(columns)
            }
            (ThermoState::Rows(columns), Some("ENERGY:")) => {
                for (column, value) in columns.iter().zip(tokens) {
                    push_sample(&mut series, column, value);
                }
                ThermoState::Rows(columns)
            }
            (state, _) => state,
        };
    }

    if series.is_empty() {
        return Err(Error::parse(format!("{ENGINE}: no 'ENERGY:' rows")));
    }
    Ok(series)
}

impl Figures {
    fn read_benchmark(&mut self, tokens: &[&str], line_no: usize) -> Result<()> {
        self.s_per_step.push(number(word_near(tokens, "s/step", -1), "s/step", line_no)?);
        if tokens.contains(&"ns/day") {
            self.ns_per_day.push(number(word_near(tokens, "ns/day", -1), "ns/day", line_no)?);
        }
        if tokens.contains(&"days/ns") {
            self.days_per_ns.push(number(word_near(tokens, "days/ns", -1), "days/ns", line_no)?);
        }
        Ok(())
    }

    fn into_parsed(self) -> Result<ParsedLog> {
        let s_per_step =
            mean(&self.s_per_step).ok_or_else(|| Error::parse(format!("{ENGINE}: no 'Benchmark time' lines")))?;
        let wall_clock = self
            .wall_clock
            .ok_or_else(|| Error::parse(format!("{ENGINE}: no 'WallClock:' line")))?;

        let mut out = ParsedLog::default();
        if let Some(ns_day) = mean(&self.ns_per_day) {
            out.set_total("ns/day", ns_day.to_string());
        }
        if let Some(days_ns) = mean(&self.days_per_ns) {
            out.set_total("days/ns", days_ns.to_string());
        }
        out.set_total("s/step", s_per_step.to_string());
        out.set_total("steps/s", (1.0 / s_per_step).to_string());
        if let Some(cpu) = self.cpu_time {
            out.set_total("CPU Time (s)", cpu);
        }
        out.set_total("Wall Clock Time including setup (s)", wall_clock.to_string());
        let startup = self.startup.unwrap_or(0.0);
        out.set_total("Wall Clock Time (s)", (wall_clock - startup).to_string());
        if let Some(startup) = self.startup {
            out.set_total("Setup time", startup.to_string());
        }
        if let Some(atoms) = self.atoms {
            out.set_total("Atoms", atoms);
        }
        Ok(out)
    }
}
