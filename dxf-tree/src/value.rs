// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Heterogeneous attribute values (§9 redesign note: "Heterogeneous
//! attribute values on tree nodes").

use crate::error::{Error, Result};

/// An attribute value: either a single group-code value, or a list built up
/// from repeated codes of the same attribute name (§4.1: "If the attribute
/// is already present, promote to a list").
///
/// Values are kept as strings during parsing for lossless round-trip;
/// numeric parsing is deferred to whichever operation needs it (§4.1).
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

impl Value {
    pub fn scalar(s: impl Into<String>) -> Self {
        Value::Scalar(s.into())
    }

    /// Appends `s`, promoting a `Scalar` to a `List` on the first repeat.
    pub fn push(&mut self, s: String) {
        match self {
            Value::Scalar(existing) => {
                let existing = std::mem::take(existing);
                *self = Value::List(vec![existing, s]);
            }
            Value::List(list) => list.push(s),
        }
    }

    /// Normalizes on read: a `Scalar` is a one-element slice.
    pub fn as_slice(&self) -> &[String] {
        match self {
            Value::Scalar(s) => std::slice::from_ref(s),
            Value::List(list) => list.as_slice(),
        }
    }

    /// The first (or only) string value.
    pub fn as_str(&self) -> &str {
        self.as_slice().first().map(String::as_str).unwrap_or("")
    }

    /// Parses the first (or only) value as a float, per the grammar in §4.1
    /// (delegated to `f64::from_str`, which matches it).
    pub fn as_f64(&self) -> Result<f64> {
        self.as_str()
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::bad_numeric(self.as_str()))
    }

    /// Parses every value in the list (or the single scalar) as a float.
    pub fn as_f64_list(&self) -> Result<Vec<f64>> {
        self.as_slice()
            .iter()
            .map(|s| s.trim().parse::<f64>().map_err(|_| Error::bad_numeric(s)))
            .collect()
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.as_str()
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::bad_numeric(self.as_str()))
    }

    pub fn as_bool(&self) -> bool {
        matches!(self.as_str().trim(), "1" | "true" | "TRUE")
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Scalar(format_float(n))
    }
}

/// Formats a float the way the emitter wants it written back into a DXF
/// stream: shortest round-trippable form, no trailing `.0` suppressed
/// (DXF readers expect a decimal point on real-valued codes).
pub fn format_float(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{:.1}", n)
    } else {
        let s = format!("{}", n);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_promotes_to_list_on_second_push() {
        let mut v = Value::scalar("A");
        assert_eq!(v.as_slice(), &["A".to_string()]);
        v.push("B".to_string());
        assert_eq!(v.as_slice(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn numeric_parse_failure_is_bad_input() {
        let v = Value::scalar("not-a-number");
        assert!(v.as_f64().is_err());
    }

    #[test]
    fn format_float_keeps_decimal_point() {
        assert_eq!(format_float(10.0), "10.0");
    }
}
