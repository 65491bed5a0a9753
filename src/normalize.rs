//! Normalization of a parsed `Totals` block onto the canonical vocabulary.
//!
//! The passes run in a fixed order because later passes read what earlier
//! ones filled in:
//!
//! 1. every canonical metric starts out missing;
//! 2. raw metrics are renamed through the crosswalk and scaled into base
//!    units (last write wins when several raw names share a canonical one);
//! 3. `ns/s` is derived from `ns/day`;
//! 4. `step/s` is derived from the wall-clock time and the raw `Steps` count;
//! 5. missing rates are filled from their reciprocal (`ns/day` <-> `day/ns`);
//! 6. everything is scaled back out into its display unit.
//!
//! A metric that cannot be derived stays `None`; that is not an error.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::coerce::coerce_value;
use crate::crosswalk::{reciprocal_name, NS_PER_DAY, NS_PER_S, STEPS, STEP_PER_S, WALL_CLOCK_TIME};
use crate::error::{Error, Result};
use crate::tables::Tables;
use crate::units::{DAY, NS, S};

const LOG_TARGET: &str = "normalize";

/// Metric name -> raw value, in log order.
pub type RawMetrics = serde_json::Map<String, Value>;

/// Canonical metric name -> value in display units, `None` when missing.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalMetrics {
    entries: Vec<(String, Option<f64>)>,
}

impl CanonicalMetrics {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).and_then(|(_, v)| *v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of metrics that have a value.
    pub fn present(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_some()).count()
    }

    /// The same metrics as a raw block, so they can be normalized again.
    /// Missing and non-finite values become `null`.
    pub fn to_raw(&self) -> RawMetrics {
        self.entries
            .iter()
            .map(|(name, value)| {
                let v = value
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number);
                (name.clone(), v)
            })
            .collect()
    }
}

impl Serialize for CanonicalMetrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Coerces every value of `raw` to a number (or `null`).
pub fn coerce_metrics(raw: &RawMetrics) -> Result<Vec<(&str, Option<f64>)>> {
    raw.iter()
        .map(|(name, value)| {
            let scalar = match coerce_value(value)? {
                Value::Null => None,
                Value::Number(n) => n.as_f64(),
                other => return Err(Error::parse(format!("metric '{name}' is not a scalar: {other}"))),
            };
            Ok((name.as_str(), scalar))
        })
        .collect()
}

/// Normalizes one `Totals` block. Fails on the first metric without a
/// registered unit or the first value that is not a number; no partial result
/// is returned in either case.
pub fn normalize(raw: &RawMetrics, tables: &Tables) -> Result<CanonicalMetrics> {
    let canonical = tables.canonical();
    let units = tables.units();
    let metrics = coerce_metrics(raw)?;

    let mut values: Vec<Option<f64>> = vec![None; canonical.len()];

    for &(name, value) in &metrics {
        let unit = units.lookup(name)?;
        let target = tables.crosswalk().resolve(name);
        let (Some(idx), Some(value)) = (canonical.position(target), value) else {
            continue;
        };
        if let Some(prev) = values[idx] {
            log::debug!(target: LOG_TARGET, "'{name}' overwrites earlier '{target}' ({prev})");
        }
        values[idx] = Some(value * unit.factor());
    }

    if let (Some(ns_s), Some(ns_day)) = (canonical.position(NS_PER_S), canonical.position(NS_PER_DAY)) {
        if let (None, Some(per_day)) = (values[ns_s], values[ns_day]) {
            let unitless = per_day / (NS / DAY).factor();
            let converted = unitless / (DAY / S).factor();
            values[ns_s] = Some(converted * (NS / S).factor());
            log::trace!(target: LOG_TARGET, "Derived '{NS_PER_S}' from '{NS_PER_DAY}'");
        }
    }

    if let (Some(rate), Some(wall)) = (canonical.position(STEP_PER_S), canonical.position(WALL_CLOCK_TIME)) {
        let steps = metrics.iter().rev().find(|(n, _)| *n == STEPS).and_then(|(_, v)| *v);
        if let (None, Some(wall), Some(steps)) = (values[rate], values[wall], steps) {
            if wall != 0.0 {
                values[rate] = Some(steps / wall);
                log::trace!(target: LOG_TARGET, "Derived '{STEP_PER_S}' from '{STEPS}' and '{WALL_CLOCK_TIME}'");
            }
        }
    }

    // Reads see values filled earlier in this same pass.
    for (idx, name) in canonical.iter().enumerate() {
        if values[idx].is_some() {
            continue;
        }
        let Some(other) = reciprocal_name(name).and_then(|back| canonical.position(&back)) else {
            continue;
        };
        if let Some(v) = values[other] {
            values[idx] = Some(1.0 / v);
            log::trace!(target: LOG_TARGET, "Filled '{name}' from its reciprocal");
        }
    }

    let entries = canonical
        .iter()
        .zip(values)
        .map(|(name, value)| {
            let display = match value {
                Some(v) => Some(v / units.lookup(name)?.factor()),
                None => None,
            };
            Ok((name.to_string(), display))
        })
        .collect::<Result<Vec<_>>>()?;

    let out = CanonicalMetrics { entries };
    log::debug!(
        target: LOG_TARGET,
        "Normalized {} raw metrics into {}/{} canonical metrics",
        raw.len(),
        out.present(),
        out.len()
    );
    Ok(out)
}

/// Normalizes a JSON value that must be a `Totals` object.
pub fn normalize_value(totals: &Value, tables: &Tables) -> Result<CanonicalMetrics> {
    match totals {
        Value::Object(raw) => normalize(raw, tables),
        other => Err(Error::parse(format!("Totals must be an object, found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crosswalk::{DAY_PER_NS, NUMBER_OF_ATOMS, S_PER_NS, S_PER_STEP};
    use serde_json::json;

    fn raw(v: Value) -> RawMetrics {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn approx(actual: Option<f64>, expected: f64) {
        let a = actual.unwrap_or_else(|| panic!("expected {expected}, got None"));
        let tol = 1e-9 * expected.abs().max(1.0);
        assert!((a - expected).abs() <= tol, "{a} != {expected}");
    }

    fn amber_totals() -> RawMetrics {
        raw(json!({
            "Atoms": "2997924",
            "Elapsed(s)": "2366.06",
            "Per Step(ms)": "236.61",
            "ns/day": "0.73",
            "seconds/ns": "118302.93"
        }))
    }

    #[test]
    fn amber_totals_fill_every_metric() {
        let out = normalize(&amber_totals(), &Tables::builtin()).unwrap();

        approx(out.get(WALL_CLOCK_TIME), 2366.06);
        approx(out.get(NUMBER_OF_ATOMS), 2_997_924.0);
        approx(out.get(S_PER_STEP), 0.23661);
        approx(out.get(STEP_PER_S), 1.0 / 0.23661);
        approx(out.get(NS_PER_DAY), 0.73);
        approx(out.get(NS_PER_S), 0.73 / 86_400.0);
        approx(out.get(S_PER_NS), 118_302.93);
        approx(out.get(DAY_PER_NS), 1.0 / 0.73);
        assert_eq!(out.present(), 8);
    }

    #[test]
    fn empty_input_yields_all_missing() {
        let out = normalize(&RawMetrics::new(), &Tables::builtin()).unwrap();
        let names: Vec<&str> = out.iter().map(|(n, _)| n).collect();
        assert_eq!(names, Tables::builtin().canonical().iter().collect::<Vec<_>>());
        assert!(out.iter().all(|(_, v)| v.is_none()));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "Wall Clock Time (s)": null, "Number of atoms": null, "step/s": null, "ns/s": null,
                "ns/day": null, "s/step": null, "s/ns": null, "day/ns": null
            })
        );
    }

    #[test]
    fn derives_ns_per_s_from_ns_per_day() {
        let out = normalize(&raw(json!({ "ns/day": "10.0" })), &Tables::builtin()).unwrap();
        approx(out.get(NS_PER_S), 10.0 / 86_400.0);
        approx(out.get(S_PER_NS), 86_400.0 / 10.0);
        approx(out.get(DAY_PER_NS), 0.1);
        assert_eq!(out.get(WALL_CLOCK_TIME), None);
    }

    #[test]
    fn derives_step_rate_from_steps_and_wall_clock() {
        let out = normalize(
            &raw(json!({ "Wall Clock Time (s)": "100", "Steps": "500" })),
            &Tables::builtin(),
        )
        .unwrap();
        approx(out.get(STEP_PER_S), 5.0);
        approx(out.get(S_PER_STEP), 0.2);
        assert_eq!(out.get(NS_PER_DAY), None);
    }

    #[test]
    fn zero_wall_clock_leaves_step_rate_missing() {
        let out = normalize(&raw(json!({ "Wall Clock Time (s)": 0, "Steps": 500 })), &Tables::builtin()).unwrap();
        assert_eq!(out.get(STEP_PER_S), None);
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let err = normalize(&raw(json!({ "ns/day": "1", "Matom-step/s": "3.2" })), &Tables::builtin()).unwrap_err();
        assert!(matches!(err, Error::UnknownUnit(name) if name == "Matom-step/s"));
    }

    #[test]
    fn unparseable_value_is_rejected() {
        let err = normalize(&raw(json!({ "ns/day": "fast" })), &Tables::builtin()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = normalize(&raw(json!({ "ns/day": ["1", "2"] })), &Tables::builtin()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn last_write_wins_for_shared_canonical_name() {
        let tables = Tables::builtin();
        let a = normalize(&raw(json!({ "CPU Time (s)": "50", "Wall Clock Time (s)": "40" })), &tables).unwrap();
        approx(a.get(WALL_CLOCK_TIME), 40.0);

        let b = normalize(&raw(json!({ "Wall Clock Time (s)": "40", "CPU Time (s)": "50" })), &tables).unwrap();
        approx(b.get(WALL_CLOCK_TIME), 50.0);
    }

    #[test]
    fn zero_rate_gives_infinite_reciprocal() {
        let out = normalize(&raw(json!({ "ns/day": "0" })), &Tables::builtin()).unwrap();
        assert_eq!(out.get(NS_PER_DAY), Some(0.0));
        assert!(out.get(DAY_PER_NS).is_some_and(f64::is_infinite));
        assert!(out.get(S_PER_NS).is_some_and(f64::is_infinite));
        assert_eq!(out.to_raw()[DAY_PER_NS], Value::Null);
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let tables = Tables::builtin();
        let once = normalize(&amber_totals(), &tables).unwrap();
        let twice = normalize(&once.to_raw(), &tables).unwrap();
        for ((name, a), (_, b)) in once.iter().zip(twice.iter()) {
            approx(b, a.unwrap_or_else(|| panic!("{name} missing")));
        }
    }

    #[test]
    fn reciprocal_pairs_multiply_to_one() {
        let out = normalize(&raw(json!({ "Elapsed(s)": "12.93", "Per Step(ms)": "3.23", "ns/day": "53.45" })), &Tables::builtin()).unwrap();
        for (name, value) in out.iter() {
            let (Some(back), Some(v)) = (reciprocal_name(name), value) else {
                continue;
            };
            if let Some(w) = out.get(&back) {
                assert!((v * w - 1.0).abs() < 1e-9, "{name} * {back} = {}", v * w);
            }
        }
    }

    #[test]
    fn null_values_count_as_missing() {
        let out = normalize(&raw(json!({ "ns/day": null, "s/ns": "2000" })), &Tables::builtin()).unwrap();
        approx(out.get(S_PER_NS), 2000.0);
        approx(out.get(NS_PER_S), 1.0 / 2000.0);
        assert_eq!(out.get(NS_PER_DAY), None);
    }

    #[test]
    fn injected_tables_are_honoured() {
        let tables = Tables::from_json_str(
            r#"{
                "units": { "runtime (ms)": "ms", "Wall Clock Time (s)": "s", "wall/step": "s", "step/wall": "1/s" },
                "crosswalk": { "runtime (ms)": "Wall Clock Time (s)" },
                "canonical": ["Wall Clock Time (s)", "wall/step", "step/wall"]
            }"#,
        )
        .unwrap();

        let out = normalize(&raw(json!({ "runtime (ms)": "1,500", "wall/step": "4" })), &tables).unwrap();
        approx(out.get(WALL_CLOCK_TIME), 1.5);
        approx(out.get("step/wall"), 0.25);
        assert!(!out.contains_key(NS_PER_DAY));

        let err = normalize(&raw(json!({ "Elapsed(s)": "1" })), &tables).unwrap_err();
        assert!(matches!(err, Error::UnknownUnit(_)));
    }

    #[test]
    fn normalize_value_requires_an_object() {
        assert!(matches!(normalize_value(&json!([1, 2]), &Tables::builtin()), Err(Error::Parse(_))));
        let out = normalize_value(&json!({ "timesteps/s,": "27.674" }), &Tables::builtin()).unwrap();
        approx(out.get(STEP_PER_S), 27.674);
    }
}
