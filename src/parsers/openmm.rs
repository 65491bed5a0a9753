//! OpenMM benchmark output.
//!
//! OpenMM has no standard log; the benchmark scripts write a flat JSON object
//! of metrics, which is taken as the totals block unchanged.

use serde_json::Value;

use super::ParsedLog;
use crate::error::{Error, Result};

pub fn parse(text: &str) -> Result<ParsedLog> {
    match serde_json::from_str(text)? {
        Value::Object(totals) => Ok(ParsedLog {
            totals,
            ..ParsedLog::default()
        }),
        other => Err(Error::parse(format!("OpenMM output must be a JSON object, found {other}"))),
    }
}
