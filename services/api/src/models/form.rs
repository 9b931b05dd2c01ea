//! Reading loosely-typed JSON form bodies
//!
//! Browser forms send numbers as strings and multi-selects either as arrays
//! or as comma-separated text. [`FormReader`] accepts both shapes, and it
//! keeps reading after a bad field so that the final error names every
//! missing or malformed field at once.

use serde::{Deserialize, Deserializer, de};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Inclusive `from..=to` range with both bounds present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds<T> {
    pub from: T,
    pub to: T,
}

/// Split a comma-separated string into trimmed, non-empty entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Whole floats inside the `i64` range; `as` would saturate anything else
fn whole_float(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18).then_some(f as i64)
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_float))
        }
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(split_list(s)),
        Value::Array(items) => items
            .iter()
            .map(|item| as_text(item).map(|s| split_list(&s)))
            .collect::<Option<Vec<_>>>()
            .map(|nested| nested.into_iter().flatten().collect()),
        _ => None,
    }
}

/// Deserialize an optional integer given as a number or numeric string
pub fn loose_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => as_integer(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom("expected a number")),
    }
}

/// Field-by-field reader collecting every missing and malformed name
pub struct FormReader<'a> {
    values: &'a Map<String, Value>,
    missing: Vec<String>,
    invalid: Vec<String>,
}

impl<'a> FormReader<'a> {
    pub fn new(values: &'a Map<String, Value>) -> Self {
        Self {
            values,
            missing: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Whether the field carries a non-blank value
    pub fn has(&self, field: &str) -> bool {
        !is_blank(self.values.get(field))
    }

    fn present(&mut self, field: &str) -> Option<&'a Value> {
        let values = self.values;
        let value = values.get(field);
        if is_blank(value) {
            self.missing.push(field.to_string());
            return None;
        }
        value
    }

    fn reject<T: Default>(&mut self, field: &str) -> T {
        self.invalid.push(field.to_string());
        T::default()
    }

    /// Required non-empty text
    pub fn text(&mut self, field: &str) -> String {
        let Some(value) = self.present(field) else {
            return String::new();
        };
        match as_text(value) {
            Some(text) => text,
            None => self.reject(field),
        }
    }

    /// Optional text; blank counts as absent
    pub fn optional_text(&mut self, field: &str) -> Option<String> {
        if !self.has(field) {
            return None;
        }
        let values = self.values;
        let value = values.get(field)?;
        match as_text(value) {
            Some(text) => Some(text),
            None => self.reject(field),
        }
    }

    /// Required list given as an array or a comma-separated string
    pub fn list(&mut self, field: &str) -> Vec<String> {
        let Some(value) = self.present(field) else {
            return Vec::new();
        };
        match as_list(value) {
            Some(items) if items.is_empty() => {
                self.missing.push(field.to_string());
                items
            }
            Some(items) => items,
            None => self.reject(field),
        }
    }

    /// Required non-negative integer given as a number or numeric string
    pub fn number<T>(&mut self, field: &str) -> T
    where
        T: TryFrom<i64> + Default,
    {
        let Some(value) = self.present(field) else {
            return T::default();
        };
        self.convert(field, value)
    }

    /// Optional non-negative integer; blank counts as absent
    pub fn optional_number<T>(&mut self, field: &str) -> Option<T>
    where
        T: TryFrom<i64> + Default,
    {
        if !self.has(field) {
            return None;
        }
        let values = self.values;
        let value = values.get(field)?;
        let before = self.invalid.len();
        let number = self.convert(field, value);
        (self.invalid.len() == before).then_some(number)
    }

    fn convert<T>(&mut self, field: &str, value: &Value) -> T
    where
        T: TryFrom<i64> + Default,
    {
        match as_integer(value)
            .filter(|n| *n >= 0)
            .and_then(|n| T::try_from(n).ok())
        {
            Some(number) => number,
            None => self.reject(field),
        }
    }

    /// Required inclusive range; `from > to` is reported on both fields
    pub fn range<T>(&mut self, from_field: &str, to_field: &str) -> Bounds<T>
    where
        T: TryFrom<i64> + Default + PartialOrd + Copy,
    {
        let before = self.missing.len() + self.invalid.len();
        let from = self.number(from_field);
        let to = self.number(to_field);
        if self.missing.len() + self.invalid.len() == before && from > to {
            self.invalid.push(from_field.to_string());
            self.invalid.push(to_field.to_string());
        }
        Bounds { from, to }
    }

    /// Turn the collected problems into a validation error, if any
    pub fn finish(self, subject: &str) -> Result<(), ApiError> {
        if self.missing.is_empty() && self.invalid.is_empty() {
            return Ok(());
        }

        let message = if self.missing.is_empty() {
            format!("Invalid {} fields: {}", subject, self.invalid.join(", "))
        } else {
            format!(
                "Missing required {} fields: {}",
                subject,
                self.missing.join(", ")
            )
        };

        Err(ApiError::Validation {
            message,
            missing_fields: self.missing,
            invalid_fields: self.invalid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn field_errors(err: ApiError) -> (Vec<String>, Vec<String>) {
        match err {
            ApiError::Validation {
                missing_fields,
                invalid_fields,
                ..
            } => (missing_fields, invalid_fields),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_split_list_drops_blank_entries() {
        assert_eq!(split_list(" Япония, ,Корея,"), vec!["Япония", "Корея"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_list_accepts_array_or_string() {
        let values = map(json!({
            "a": ["Седан", " Хэтчбек "],
            "b": "АКПП, МКПП",
            "c": [],
            "d": ""
        }));
        let mut form = FormReader::new(&values);

        assert_eq!(form.list("a"), vec!["Седан", "Хэтчбек"]);
        assert_eq!(form.list("b"), vec!["АКПП", "МКПП"]);
        form.list("c");
        form.list("d");

        let (missing, invalid) = field_errors(form.finish("test").unwrap_err());
        assert_eq!(missing, vec!["c", "d"]);
        assert!(invalid.is_empty());
    }

    #[test]
    fn test_number_accepts_numeric_strings_and_zero() {
        let values = map(json!({
            "price": "500000",
            "mileage": 0,
            "year": 2015.0,
            "power": "abc",
            "neg": -5
        }));
        let mut form = FormReader::new(&values);

        assert_eq!(form.number::<i64>("price"), 500_000);
        assert_eq!(form.number::<i64>("mileage"), 0);
        assert_eq!(form.number::<i32>("year"), 2015);
        form.number::<i32>("power");
        form.number::<i32>("neg");

        let (missing, invalid) = field_errors(form.finish("test").unwrap_err());
        assert!(missing.is_empty());
        assert_eq!(invalid, vec!["power", "neg"]);
    }

    #[test]
    fn test_out_of_range_numbers_are_invalid() {
        let values = map(json!({
            "huge": "1e30",
            "huge_number": 1e30,
            "infinite": "inf",
            "u64": 18_446_744_073_709_551_615u64,
            "ok": "2.5e5"
        }));
        let mut form = FormReader::new(&values);

        form.number::<i64>("huge");
        form.number::<i64>("huge_number");
        form.number::<i64>("infinite");
        form.number::<i64>("u64");
        assert_eq!(form.number::<i64>("ok"), 250_000);

        let (missing, invalid) = field_errors(form.finish("test").unwrap_err());
        assert!(missing.is_empty());
        assert_eq!(invalid, vec!["huge", "huge_number", "infinite", "u64"]);
    }

    #[test]
    fn test_inverted_range_flags_both_bounds() {
        let values = map(json!({ "from": 2020, "to": 2015 }));
        let mut form = FormReader::new(&values);
        form.range::<i32>("from", "to");

        let (_, invalid) = field_errors(form.finish("test").unwrap_err());
        assert_eq!(invalid, vec!["from", "to"]);
    }

    #[test]
    fn test_optional_fields() {
        let values = map(json!({ "year": "", "photo": "  /a.png ", "count": "7" }));
        let mut form = FormReader::new(&values);

        assert_eq!(form.optional_number::<i32>("year"), None);
        assert_eq!(form.optional_number::<i32>("count"), Some(7));
        assert_eq!(form.optional_text("photo"), Some("/a.png".to_string()));
        assert_eq!(form.optional_text("absent"), None);
        assert!(form.finish("test").is_ok());
    }
}
