//! AMBER `mdout` parser.
//!
//! ```text
//! |   Executable path: pmemd.cuda           -> "AMBER info"
//!  Here is the input file:                  -> "Infile" (key=value, ...)
//! 4.  RESULTS / ... INFORMATION ...
//!    5.  TIMINGS                            -> timing tables
//! |  Final Performance Info:
//! |     Average timings for all steps:      -> "Totals" (label = value ...)
//! ```
//!
//! The energy records printed every `ntpr` steps in section 4 are read by
//! [`parse_energies`].

use serde_json::{json, Value};

use super::{check_error_marker, push_sample, EnergySeries, ParsedLog};
use crate::error::{Error, Result};

const ENGINE: &str = "AMBER";
const ERROR_MARKER: &str = "ERROR:";

pub const INFO_BLOCK: &str = "AMBER info";
pub const INFILE_BLOCK: &str = "Infile";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Preamble,
    InputFile,
    Body,
    Timings(Section),
    Totals,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Unnamed,
    MajorRoutines,
    PmeNonbondPairlist,
    PmeDirectForce,
    PmeReciprocalForce,
}

impl Section {
    fn block_name(self) -> &'static str {
        match self {
            Section::Unnamed => "NONE",
            Section::MajorRoutines => "Major Routines",
            Section::PmeNonbondPairlist => "PME Nonbond Pairlist",
            Section::PmeDirectForce => "PME Direct Force",
            Section::PmeReciprocalForce => "PME Reciprocal Force",
        }
    }

    fn from_heading(line: &str) -> Option<Self> {
        if line.contains("NonSetup CPU Time in Major Routines") {
            Some(Section::MajorRoutines)
        } else if line.contains("PME Nonbond Pairlist CPU Time") {
            Some(Section::PmeNonbondPairlist)
        } else if line.contains("PME Direct Force CPU Time") {
            Some(Section::PmeDirectForce)
        } else if line.contains("PME Reciprocal Force") {
            Some(Section::PmeReciprocalForce)
        } else {
            None
        }
    }
}

pub fn parse(text: &str) -> Result<ParsedLog> {
    let mut out = ParsedLog::default();
    let _ = out.block(INFO_BLOCK);
    let _ = out.block(INFILE_BLOCK);

    let mut state = State::Preamble;
    for (line_no, line) in text.lines().enumerate() {
        check_error_marker(ENGINE, ERROR_MARKER, line_no, line)?;

        state = match state {
            // The timing and totals sections are found from any earlier state;
            // not every build prints the headers in between.
            State::Preamble | State::InputFile | State::Body if line.contains("TIMINGS") => {
                State::Timings(Section::Unnamed)
            }
            State::Preamble | State::InputFile | State::Body if line.contains("Average timings for all steps") => {
                State::Totals
            }
            State::Preamble if line.contains("Here is the input file") => State::InputFile,
            State::Preamble => {
                read_info_line(&mut out, line);
                State::Preamble
            }
            State::InputFile if line.contains("INFORMATION") => State::Body,
            State::InputFile => {
                read_input_statements(&mut out, line);
                State::InputFile
            }
            State::Body => State::Body,
            State::Timings(_) if line.contains("Final Performance") => State::Body,
            State::Timings(section) => match Section::from_heading(line) {
                Some(next) => State::Timings(next),
                None => {
                    read_timing_row(&mut out, section, line);
                    State::Timings(section)
                }
            },
            State::Totals => {
                read_totals_line(&mut out, line);
                State::Totals
            }
        };
    }

    Ok(out)
}

/// `|   Executable path: pmemd.cuda`
fn read_info_line(out: &mut ParsedLog, line: &str) {
    let Some(rest) = line.trim().strip_prefix('|') else {
        return;
    };
    if let Some((key, value)) = rest.split_once(": ") {
        let (key, value) = (key.trim(), value.trim());
        if !key.is_empty() && !value.is_empty() {
            let _ = out.block(INFO_BLOCK).insert(key.to_string(), Value::from(value));
        }
    }
}

/// `  imin=0, irest=1, ntx=5,`
fn read_input_statements(out: &mut ParsedLog, line: &str) {
    if !line.contains(',') {
        return;
    }
    for statement in line.split(',') {
        if let Some((key, value)) = statement.trim().split_once('=') {
            let _ = out
                .block(INFILE_BLOCK)
                .insert(key.trim().to_string(), Value::from(value.trim()));
        }
    }
}

/// `|     Nonbond           14.98   92.63` -> `{"Nonbond": {"Sec": .., "%": ..}}`
fn read_timing_row(out: &mut ParsedLog, section: Section, line: &str) {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() <= 3 {
        return;
    }
    let tokens = &tokens[1..];
    let split = tokens.len() - 2;
    let name = tokens[..split].join(" ");
    let row = json!({ "Sec": tokens[split], "%": tokens[split + 1] });
    let _ = out.block(section.block_name()).insert(name, row);
}

/// `label = value` pairs on one line; a label may span several tokens
/// (`1-4 NB = 545.98`).
fn labelled_values<'a>(tokens: &[&'a str]) -> Vec<(String, &'a str)> {
    let mut out = Vec::new();
    let mut label_start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if *token != "=" || i < label_start {
            continue;
        }
        let Some(value) = tokens.get(i + 1) else {
            break;
        };
        out.push((tokens[label_start..i].join(" "), *value));
        label_start = i + 2;
    }
    out
}

/// `|     Elapsed(s) =      16.17 Per Step(ms) =       3.23`
fn read_totals_line(out: &mut ParsedLog, line: &str) {
    let tokens: Vec<&str> = line.split_whitespace().skip(1).collect();
    for (label, value) in labelled_values(&tokens) {
        out.set_total(&label, value);
    }
}

/// Where the energy reader is in the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EnergyState {
    /// Before the first `NSTEP =` record.
    Setup,
    /// Inside the per-step records.
    Records,
    /// From `A V E R A G E S` on; averages and fluctuations are not samples.
    Summary,
}

/// Reads every per-step energy record into one array per term.
///
/// ```text
///  NSTEP =     1000   TIME(PS) =       2.000  TEMP(K) =   300.12  PRESS =     0.0
///  Etot   =    -70618.3621  EKtot   =     14305.6262  EPtot      =    -84923.9883
///  1-4 NB =       545.9864  1-4 EEL =      6666.4166  VDWAALS    =     10315.3496
/// ```
pub fn parse_energies(text: &str) -> Result<EnergySeries> {
    let mut series = EnergySeries::new();

    let mut state = EnergyState::Setup;
    for (line_no, line) in text.lines().enumerate() {
        check_error_marker(ENGINE, ERROR_MARKER, line_no, line)?;

        state = match state {
            EnergyState::Setup | EnergyState::Records if line.contains("A V E R A G E S") => EnergyState::Summary,
            EnergyState::Setup if !line.trim_start().starts_with("NSTEP") => EnergyState::Setup,
            EnergyState::Setup | EnergyState::Records => {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                for (term, value) in labelled_values(&tokens) {
                    push_sample(&mut series, &term, value);
                }
                EnergyState::Records
            }
            EnergyState::Summary => EnergyState::Summary,
        };
    }

    if series.is_empty() {
        return Err(Error::parse(format!("{ENGINE}: no energy records")));
    }
    Ok(series)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crosswalk::{NS_PER_DAY, S_PER_STEP, WALL_CLOCK_TIME};
    use crate::normalize::normalize;
    use crate::tables::Tables;

    pub(crate) const MDOUT: &str = "
          -------------------------------------------------------
          Amber 20 PMEMD                              2020
          -------------------------------------------------------

| PMEMD implementation of SANDER, Release 18

|  Compiled date/time: Thu Apr 30 10:15:04 2020
| Run on 04/26/2024 at 10:53:21

|   Executable path: pmemd.cuda
| Working directory: /scratch/bench/stmv
|          Hostname: node001

 Here is the input file:

 NPT production
 &cntrl
   imin=0, irest=1, ntx=5,
   nstlim=5000, dt=0.004,
   ntc=2, ntf=2, cut=9.0,
 /

| GPU (CUDA) Version information:
--------------------------------------------------------------------------------
   1.  RESOURCE   USE:
| INFORMATION: unit cell
   ...
--------------------------------------------------------------------------------
   5.  TIMINGS
--------------------------------------------------------------------------------

|  NonSetup CPU Time in Major Routines:
|
|     Routine           Sec        %
|     ------------------------------
|     Nonbond          14.98   92.63
|     Bond              0.00    0.00
|     Other             1.19    7.37
|     ------------------------------
|     Total            16.17

|  PME Nonbond Pairlist CPU Time:
|
|     Routine              Sec        %
|     ---------------------------------
|     Set Up Cit           0.00    0.00
|     Build List           0.00    0.00

|  Final Performance Info:
|     -----------------------------------------------------
|     Average timings for last    4000 steps:
|     Elapsed(s) =      12.93 Per Step(ms) =       3.23
|         ns/day =      53.45   seconds/ns =    1616.38
|
|     Average timings for all steps:
|     Elapsed(s) =      16.17 Per Step(ms) =       3.23
|         ns/day =      53.43   seconds/ns =    1617.11
|     -----------------------------------------------------

|  Master Setup CPU time:            0.52 seconds
|  Master Total wall time:          17    seconds     0.00 hours
";

    #[test]
    fn reads_all_sections() {
        let log = parse(MDOUT).unwrap();

        let info = log.blocks[INFO_BLOCK].as_object().unwrap();
        assert_eq!(info["Executable path"], "pmemd.cuda");
        assert_eq!(info["Hostname"], "node001");

        let infile = log.blocks[INFILE_BLOCK].as_object().unwrap();
        assert_eq!(infile["nstlim"], "5000");
        assert_eq!(infile["dt"], "0.004");
        assert_eq!(infile["cut"], "9.0");

        let major = log.blocks["Major Routines"].as_object().unwrap();
        assert_eq!(major["Nonbond"]["Sec"], "14.98");
        assert_eq!(major["Nonbond"]["%"], "92.63");
        let pairlist = log.blocks["PME Nonbond Pairlist"].as_object().unwrap();
        assert_eq!(pairlist["Set Up Cit"]["Sec"], "0.00");

        let keys: Vec<&str> = log.totals.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Elapsed(s)", "Per Step(ms)", "ns/day", "seconds/ns"]);
        assert_eq!(log.totals["Elapsed(s)"], "16.17");
        assert_eq!(log.totals["seconds/ns"], "1617.11");
    }

    #[test]
    fn totals_normalize() {
        let log = parse(MDOUT).unwrap();
        let canonical = normalize(&log.totals, &Tables::builtin()).unwrap();
        assert_eq!(canonical.get(WALL_CLOCK_TIME), Some(16.17));
        assert!((canonical.get(S_PER_STEP).unwrap() - 0.00323).abs() < 1e-12);
        assert!((canonical.get(NS_PER_DAY).unwrap() - 53.43).abs() < 1e-9);
    }

    #[test]
    fn error_marker_aborts() {
        let text = format!("{MDOUT}\n ERROR: Calculation halted.  Periodic box dimensions have changed too much\n");
        assert!(matches!(parse(&text), Err(Error::Parse(_))));
    }

    #[test]
    fn sections_found_without_information_line() {
        let text = MDOUT.replace("| INFORMATION: unit cell\n", "");
        let log = parse(&text).unwrap();
        assert_eq!(log.totals["Elapsed(s)"], "16.17");
        assert_eq!(log.blocks["Major Routines"]["Nonbond"]["Sec"], "14.98");
        assert_eq!(log.blocks[INFILE_BLOCK]["nstlim"], "5000");
    }

    const ENERGIES: &str = "
   4.  RESULTS
--------------------------------------------------------------------------------

 NSTEP =      500   TIME(PS) =       1.000  TEMP(K) =   299.87  PRESS =     0.0
 Etot   =    -70618.3621  EKtot   =     14305.6262  EPtot      =    -84923.9883
 1-4 NB =       545.9864  1-4 EEL =      6666.4166  VDWAALS    =     10315.3496
 Ewald error estimate:   0.1234E-03
 ------------------------------------------------------------------------------

 NSTEP =     1000   TIME(PS) =       2.000  TEMP(K) =   300.12  PRESS =     0.0
 Etot   =    -70620.0001  EKtot   =     14310.0000  EPtot      =    -84930.0001
 1-4 NB =       546.0000  1-4 EEL =      6667.0000  VDWAALS    =     10316.0000
 Density    =         1.0123
 ------------------------------------------------------------------------------

      A V E R A G E S   O V E R    1000 S T E P S

 NSTEP =     1000   TIME(PS) =       2.000  TEMP(K) =   300.00  PRESS =     0.0
 Etot   =    -70619.0000  EKtot   =     14307.0000  EPtot      =    -84926.0000
";

    #[test]
    fn energy_records_become_series() {
        let series = parse_energies(ENERGIES).unwrap();
        let terms: Vec<&str> = series.keys().map(String::as_str).collect();
        assert_eq!(
            terms,
            ["NSTEP", "TIME(PS)", "TEMP(K)", "PRESS", "Etot", "EKtot", "EPtot", "1-4 NB", "1-4 EEL", "VDWAALS", "Density"]
        );
        assert_eq!(series["NSTEP"], serde_json::json!(["500", "1000"]));
        assert_eq!(series["Etot"], serde_json::json!(["-70618.3621", "-70620.0001"]));
        assert_eq!(series["Density"], serde_json::json!(["1.0123"]));
    }

    #[test]
    fn energies_need_records() {
        assert!(matches!(parse_energies(MDOUT), Err(Error::Parse(_))));
        let failed = format!("{ENERGIES} ERROR: Calculation halted\n");
        assert!(matches!(parse_energies(&failed), Err(Error::Parse(_))));
    }

    #[test]
    fn truncated_log_has_empty_totals() {
        let cut = MDOUT.split("|  Final Performance Info:").next().unwrap();
        let log = parse(cut).unwrap();
        assert!(log.totals.is_empty());
        assert!(log.blocks.contains_key("Major Routines"));
    }
}
