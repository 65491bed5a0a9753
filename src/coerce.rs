//! Coercion of string-encoded log values into numbers.
//!
//! Logs report values like `"2,366.06"`, `"12.5 ms"` or
//! `"2024/04/26 10:53:21.000000"`. Everything that is not part of the number is
//! discarded; timestamps become Unix epoch seconds in the local timezone.

use std::sync::OnceLock;

use chrono::{Local, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use regex::Regex;
use serde_json::{Number, Value};

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}/\d{1,2}/\d{1,2} \d{1,2}:\d{2}:\d{2}\.\d{1,6}$").expect("timestamp pattern is valid")
    })
}

fn non_numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("numeric filter is valid"))
}

/// A number recovered from a log string.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    /// Floats with no fractional part collapse to integers.
    fn from_f64(f: f64) -> Self {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            Numeric::Int(f as i64)
        } else {
            Numeric::Float(f)
        }
    }

    pub fn into_json(self) -> Result<Value> {
        match self {
            Numeric::Int(i) => Ok(Value::from(i)),
            Numeric::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| Error::parse(format!("{f} is not representable in JSON"))),
        }
    }
}

/// Parses `YYYY/MM/DD HH:MM:SS.ffffff` as local time, returning epoch seconds.
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim();
    if !timestamp_re().is_match(s) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()?;
    epoch_seconds(&Local, &naive)
}

/// Longest clock jump searched over when `local` falls in a gap.
const MAX_GAP_MINUTES: i64 = 24 * 60;
const GAP_STEP_MINUTES: i64 = 15;

/// Epoch seconds of the wall-clock time `local` in `tz`.
///
/// An ambiguous time (clocks turned back) takes its first occurrence. A time
/// skipped by a forward jump is read with the offset in force after the
/// jump, so `02:30` in a `02:00 -> 03:00` gap lands on `01:30` before it.
pub fn epoch_seconds<Tz: TimeZone>(tz: &Tz, local: &NaiveDateTime) -> Option<f64> {
    let offset = match tz.offset_from_local_datetime(local) {
        LocalResult::Single(offset) | LocalResult::Ambiguous(offset, _) => offset.fix(),
        LocalResult::None => (1..=MAX_GAP_MINUTES / GAP_STEP_MINUTES).find_map(|n| {
            let after = local.checked_add_signed(TimeDelta::minutes(n * GAP_STEP_MINUTES))?;
            tz.offset_from_local_datetime(&after).earliest().map(|o| o.fix())
        })?,
    };
    let utc = local
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))?
        .and_utc();
    Some(utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_micros()) / 1e6)
}

/// Coerces one string to a number.
///
/// With `try_timestamp`, a string in the fixed timestamp format is converted
/// to epoch seconds before any numeric parsing is attempted. Otherwise every
/// character other than digits, `.` and a leading `-` is dropped and the rest
/// parsed.
pub fn coerce_str(s: &str, try_timestamp: bool) -> Result<Numeric> {
    if try_timestamp {
        if let Some(ts) = parse_timestamp(s) {
            return Ok(Numeric::Float(ts));
        }
    }

    let stripped = non_numeric_re().replace_all(s, "");
    let (negative, digits) = match stripped.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, &*stripped),
    };
    let digits: String = digits.chars().filter(|&c| c != '-').collect();
    let cleaned = if negative { format!("-{digits}") } else { digits };

    if cleaned.is_empty() || cleaned == "-" || cleaned == "." || cleaned == "-." {
        return Err(Error::parse(format!("no number in '{s}'")));
    }

    if !cleaned.contains('.') {
        if let Ok(i) = cleaned.parse::<i64>() {
            return Ok(Numeric::Int(i));
        }
    }

    cleaned
        .parse::<f64>()
        .map(Numeric::from_f64)
        .map_err(|e| Error::parse(format!("'{s}' -> '{cleaned}': {e}")))
}

/// Recursively coerces every string inside `value`; numbers, booleans and
/// nulls pass through unchanged and object keys are left alone.
pub fn coerce_value(value: &Value) -> Result<Value> {
    match value {
        Value::String(s) => coerce_str(s, true)?.into_json(),
        Value::Array(items) => items.iter().map(coerce_value).collect::<Result<Vec<_>>>().map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let _ = out.insert(k.clone(), coerce_value(v)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use serde_json::json;

    #[test]
    fn strips_separators_and_units() {
        assert_eq!(coerce_str("2,366.06", true).unwrap(), Numeric::Float(2366.06));
        assert_eq!(coerce_str("118302.93", true).unwrap(), Numeric::Float(118302.93));
        assert_eq!(coerce_str("5", true).unwrap(), Numeric::Int(5));
        assert_eq!(coerce_str("  400 MB", true).unwrap(), Numeric::Int(400));
        assert_eq!(coerce_str("12.5ms", false).unwrap(), Numeric::Float(12.5));
    }

    #[test]
    fn integral_floats_become_ints() {
        assert_eq!(coerce_str("5.0", true).unwrap(), Numeric::Int(5));
        assert_eq!(coerce_str("1,000.00", true).unwrap(), Numeric::Int(1000));
    }

    #[test]
    fn keeps_only_a_leading_minus() {
        assert_eq!(coerce_str("-3.5", true).unwrap(), Numeric::Float(-3.5));
        assert_eq!(coerce_str("~3-", true).unwrap(), Numeric::Int(3));
        assert_eq!(coerce_str("10-20", true).unwrap(), Numeric::Int(1020));
    }

    #[test]
    fn rejects_strings_without_a_number() {
        assert!(matches!(coerce_str("n/a", true), Err(Error::Parse(_))));
        assert!(matches!(coerce_str("", true), Err(Error::Parse(_))));
        assert!(matches!(coerce_str("-", true), Err(Error::Parse(_))));
        assert!(matches!(coerce_str("1.2.3", true), Err(Error::Parse(_))));
    }

    #[test]
    fn timestamps_use_local_time() {
        let expected = Local.with_ymd_and_hms(2024, 4, 26, 10, 53, 21).earliest().unwrap().timestamp() as f64;
        assert_eq!(coerce_str("2024/04/26 10:53:21.000000", true).unwrap(), Numeric::Float(expected));

        let frac = parse_timestamp("2024/04/26 10:53:21.250000").unwrap();
        assert!((frac - (expected + 0.25)).abs() < 1e-6);
    }

    /// US Eastern around the 2024 spring-forward and fall-back transitions.
    #[derive(Clone, Copy, Debug)]
    struct Eastern;

    impl Eastern {
        const EST: i32 = -5 * 3600;
        const EDT: i32 = -4 * 3600;

        fn spring_forward() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(7, 0, 0).unwrap()
        }

        fn fall_back() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 11, 3).unwrap().and_hms_opt(6, 0, 0).unwrap()
        }
    }

    impl TimeZone for Eastern {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Eastern
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let valid: Vec<FixedOffset> = [Self::EDT, Self::EST]
                .into_iter()
                .map(|secs| FixedOffset::east_opt(secs).unwrap())
                .filter(|o| self.offset_from_utc_datetime(&(*local - TimeDelta::seconds(o.local_minus_utc().into()))) == *o)
                .collect();
            match valid[..] {
                [] => LocalResult::None,
                [one] => LocalResult::Single(one),
                [first, second] => LocalResult::Ambiguous(first, second),
                _ => unreachable!(),
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let dst = *utc >= Self::spring_forward() && *utc < Self::fall_back();
            FixedOffset::east_opt(if dst { Self::EDT } else { Self::EST }).unwrap()
        }
    }

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn skipped_wall_clock_times_use_the_later_offset() {
        assert_eq!(epoch_seconds(&Eastern, &naive("2024/03/10 01:30:00.0")), Some(1_710_052_200.0));
        // 02:30 does not exist that night; read as EDT it is 06:30 UTC.
        assert_eq!(epoch_seconds(&Eastern, &naive("2024/03/10 02:30:00.0")), Some(1_710_052_200.0));
        assert_eq!(epoch_seconds(&Eastern, &naive("2024/03/10 02:00:00.0")), Some(1_710_050_400.0));
        assert_eq!(epoch_seconds(&Eastern, &naive("2024/03/10 03:30:00.0")), Some(1_710_055_800.0));
    }

    #[test]
    fn repeated_wall_clock_times_use_the_first_occurrence() {
        assert_eq!(epoch_seconds(&Eastern, &naive("2024/11/03 01:30:00.500")), Some(1_730_611_800.5));
        assert_eq!(epoch_seconds(&Eastern, &naive("2024/07/01 12:00:00.0")), Some(1_719_849_600.0));
    }

    #[test]
    fn timestamps_can_be_skipped() {
        // Without timestamp parsing, the digits are simply concatenated.
        assert_eq!(
            coerce_str("2024/04/26 10:53:21.5", false).unwrap(),
            Numeric::Float(20240426105321.5)
        );
        assert!(parse_timestamp("2024-04-26 10:53:21.000000").is_none());
        assert!(parse_timestamp("2024/04/26 10:53:21").is_none());
    }

    #[test]
    fn coerces_nested_containers() {
        let raw = json!({
            "Totals": { "ns/day": "42.43", "Atoms": 23558, "done": true },
            "samples": ["1", "2.5", null]
        });
        let out = coerce_value(&raw).unwrap();
        assert_eq!(
            out,
            json!({
                "Totals": { "ns/day": 42.43, "Atoms": 23558, "done": true },
                "samples": [1, 2.5, null]
            })
        );
    }

    #[test]
    fn nested_failures_propagate() {
        assert!(coerce_value(&json!({ "a": ["1", "x"] })).is_err());
    }
}
