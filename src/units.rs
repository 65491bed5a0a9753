//! Units of measure for benchmark metrics.
//!
//! A [`Unit`] is a scale factor relative to the base unit (one second per time
//! dimension) together with the exponent of the time dimension. Counts (atoms,
//! steps, cycles) are dimensionless. Simulated nanoseconds are time, so `ns/s`
//! is dimensionless with a factor of `1e-9`.
//!
//! Units parse from short expressions such as `"ns/day"`, `"1/s"` or
//! `"hour/ns"`, which is also how they appear in table files.

use std::collections::BTreeMap;
use std::ops::{Div, Mul};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit {
    factor: f64,
    time: i32,
}

pub const ONE: Unit = Unit::new(1.0, 0);
pub const S: Unit = Unit::new(1.0, 1);
pub const MS: Unit = Unit::new(1e-3, 1);
pub const NS: Unit = Unit::new(1e-9, 1);
pub const HOUR: Unit = Unit::new(3_600.0, 1);
pub const DAY: Unit = Unit::new(86_400.0, 1);

impl Unit {
    pub const fn new(factor: f64, time: i32) -> Self {
        Self { factor, time }
    }

    /// Multiplier taking a value in this unit to the base representation.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Exponent of the time dimension (`-1` for rates, `0` for counts).
    pub fn time_exponent(&self) -> i32 {
        self.time
    }

    pub fn is_dimensionless(&self) -> bool {
        self.time == 0
    }

    pub fn recip(self) -> Self {
        ONE / self
    }

    fn symbol(sym: &str) -> Option<Unit> {
        match sym {
            "1" => Some(ONE),
            "s" => Some(S),
            "ms" => Some(MS),
            "ns" => Some(NS),
            "hour" => Some(HOUR),
            "day" => Some(DAY),
            _ => None,
        }
    }
}

impl Mul for Unit {
    type Output = Unit;

    fn mul(self, rhs: Unit) -> Unit {
        Unit::new(self.factor * rhs.factor, self.time + rhs.time)
    }
}

impl Div for Unit {
    type Output = Unit;

    fn div(self, rhs: Unit) -> Unit {
        Unit::new(self.factor / rhs.factor, self.time - rhs.time)
    }
}

impl FromStr for Unit {
    type Err = Error;

    /// Parses `sym ((*|/) sym)*` where `sym` is one of `1, s, ms, ns, hour, day`.
    fn from_str(expr: &str) -> Result<Self> {
        let mut unit = ONE;
        let mut op = '*';
        let mut rest = expr.trim();
        if rest.is_empty() {
            return Err(Error::InvalidTables(format!("empty unit expression '{expr}'")));
        }

        loop {
            let end = rest.find(['*', '/']).unwrap_or(rest.len());
            let (sym, tail) = rest.split_at(end);
            let sym = sym.trim();
            let factor = Unit::symbol(sym)
                .ok_or_else(|| Error::InvalidTables(format!("unknown unit symbol '{sym}' in '{expr}'")))?;
            unit = if op == '*' { unit * factor } else { unit / factor };

            let mut chars = tail.chars();
            match chars.next() {
                Some(next) => {
                    op = next;
                    rest = chars.as_str();
                }
                None => return Ok(unit),
            }
        }
    }
}

/// Registry entry: the parsed unit plus the expression it was declared with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitSpec {
    expr: String,
    unit: Unit,
}

impl UnitSpec {
    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }
}

impl TryFrom<String> for UnitSpec {
    type Error = Error;

    fn try_from(expr: String) -> Result<Self> {
        let unit = expr.parse()?;
        Ok(Self { expr, unit })
    }
}

impl From<UnitSpec> for String {
    fn from(spec: UnitSpec) -> String {
        spec.expr
    }
}

/// Metric name -> unit of measure, for raw and canonical names alike.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitRegistry {
    entries: BTreeMap<String, UnitSpec>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, expr: &str) -> Result<()> {
        let spec = UnitSpec::try_from(expr.to_string())?;
        let _ = self.entries.insert(name.into(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Unit> {
        self.entries.get(name).map(UnitSpec::unit)
    }

    /// Like [`get`](Self::get) but an unregistered name is an error.
    pub fn lookup(&self, name: &str) -> Result<Unit> {
        self.get(name).ok_or_else(|| Error::UnknownUnit(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UnitSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Registry covering every metric name the bundled log parsers emit.
    pub fn builtin() -> Self {
        const ENTRIES: &[(&str, &str)] = &[
            ("Wall time (s)", "s"),
            ("ns/day", "ns/day"),
            ("day/ns", "day/ns"),
            ("days/ns", "day/ns"),
            ("ns/s", "ns/s"),
            ("s/ns", "s/ns"),
            ("s/step", "s"),
            ("hours/ns", "hour/ns"),
            ("hours/ns,", "hour/ns"),
            ("hour/ns", "hour/ns"),
            ("steps/s", "1/s"),
            ("step/s", "1/s"),
            ("Steps/s", "1/s"),
            ("Steps/second", "1/s"),
            ("timesteps/s", "1/s"),
            ("timesteps/s,", "1/s"),
            ("Wall Clock Time (s)", "s"),
            ("Elapsed(s)", "s"),
            ("seconds/ns", "s/ns"),
            ("second/ns", "s/ns"),
            ("Number of atoms", "1"),
            ("Atoms", "1"),
            ("CPU Time (s)", "s"),
            ("Wall Clock Time including setup (s)", "s"),
            ("Setup time", "s"),
            ("Giga-Cycles", "1"),
            ("Mflops", "1"),
            ("Steps", "1"),
            ("Timestep", "ns"),
            ("Per Step(ms)", "ms"),
        ];

        let mut registry = Self::new();
        for &(name, expr) in ENTRIES {
            registry
                .insert(name, expr)
                .expect("built-in unit expressions use known symbols");
        }
        registry
    }
}
