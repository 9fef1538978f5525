//! Attribute casts applied when attributes are read

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::str::FromStr;

use crate::error::{ModelError, OrmResult};
use crate::value::{Value, DATE_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Int,
    Float,
    /// Float rounded to the given number of decimals
    Decimal(u32),
    String,
    Bool,
    Json,
    DateTime,
    /// `YYYY-MM-DD` text
    Date,
    /// Seconds since the epoch
    Timestamp,
}

impl FromStr for CastType {
    type Err = ModelError;

    fn from_str(s: &str) -> OrmResult<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        if let Some(places) = lowered.strip_prefix("decimal:") {
            let places = places
                .parse()
                .map_err(|_| ModelError::Validation(format!("Invalid decimal cast: {}", s)))?;
            return Ok(CastType::Decimal(places));
        }
        match lowered.as_str() {
            "int" | "integer" => Ok(CastType::Int),
            "float" | "double" | "real" => Ok(CastType::Float),
            "string" => Ok(CastType::String),
            "bool" | "boolean" => Ok(CastType::Bool),
            "array" | "json" | "object" | "collection" => Ok(CastType::Json),
            "datetime" => Ok(CastType::DateTime),
            "date" => Ok(CastType::Date),
            "timestamp" => Ok(CastType::Timestamp),
            _ => Err(ModelError::Validation(format!("Unknown cast type: {}", s))),
        }
    }
}

impl CastType {
    /// Convert a stored value. `Null` stays `Null`, and so does a value the
    /// cast cannot interpret.
    pub fn cast(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            CastType::Int => value.as_i64().map(Value::Int).unwrap_or_default(),
            CastType::Float => value.as_f64().map(Value::Float).unwrap_or_default(),
            CastType::Decimal(places) => decimal(value, *places).map(Value::Float).unwrap_or_default(),
            CastType::String => match value {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            },
            CastType::Bool => value.as_bool().map(Value::Bool).unwrap_or_default(),
            CastType::Json => match value {
                Value::Json(json) => Value::Json(json.clone()),
                Value::String(s) => serde_json::from_str::<JsonValue>(s).map(Value::Json).unwrap_or_default(),
                Value::Bytes(b) => serde_json::from_slice::<JsonValue>(b).map(Value::Json).unwrap_or_default(),
                other => Value::Json(other.to_json()),
            },
            CastType::DateTime => value.as_datetime().map(Value::DateTime).unwrap_or_default(),
            CastType::Date => value
                .as_datetime()
                .map(|dt| Value::String(dt.format(DATE_FORMAT).to_string()))
                .unwrap_or_default(),
            CastType::Timestamp => value.as_datetime().map(|dt| Value::Int(dt.timestamp())).unwrap_or_default(),
        }
    }
}

fn decimal(value: &Value, places: u32) -> Option<f64> {
    let parsed = match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Float(f) => Decimal::try_from(*f).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Bool(b) => Some(Decimal::from(i64::from(*b))),
        _ => None,
    }?;
    parsed.round_dp(places).to_f64()
}

/// Look up and apply the cast declared for `key`, if any
pub(crate) fn apply(cast: Option<&str>, value: &Value) -> Value {
    let Some(name) = cast else {
        return value.clone();
    };
    match name.parse::<CastType>() {
        Ok(cast) => cast.cast(value),
        Err(err) => {
            tracing::warn!(cast = name, error = %err, "ignoring unknown attribute cast");
            value.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_parse_cast_names() {
        assert_eq!("integer".parse::<CastType>().unwrap(), CastType::Int);
        assert_eq!("decimal:2".parse::<CastType>().unwrap(), CastType::Decimal(2));
        assert_eq!("collection".parse::<CastType>().unwrap(), CastType::Json);
        assert!("money".parse::<CastType>().is_err());
        assert!("decimal:x".parse::<CastType>().is_err());
    }

    #[test]
    fn test_numeric_casts() {
        assert_eq!(CastType::Int.cast(&Value::from("42")), Value::Int(42));
        assert_eq!(CastType::Float.cast(&Value::Int(3)), Value::Float(3.0));
        assert_eq!(CastType::Decimal(2).cast(&Value::from("19.999")), Value::Float(20.0));
        assert_eq!(CastType::Decimal(2).cast(&Value::Int(5)), Value::Float(5.0));
        assert_eq!(CastType::Decimal(1).cast(&Value::Float(2.34)), Value::Float(2.3));
        assert_eq!(CastType::Decimal(2).cast(&Value::from("n/a")), Value::Null);
        assert_eq!(CastType::Int.cast(&Value::Null), Value::Null);
    }

    #[test]
    fn test_bool_cast_accepts_driver_forms() {
        for (raw, expected) in [
            (Value::Int(1), true),
            (Value::Int(0), false),
            (Value::from("t"), true),
            (Value::from("f"), false),
            (Value::from("yes"), true),
            (Value::from("false"), false),
        ] {
            assert_eq!(CastType::Bool.cast(&raw), Value::Bool(expected));
        }
    }

    #[test]
    fn test_json_and_date_casts() {
        assert_eq!(
            CastType::Json.cast(&Value::from(r#"{"color":"red"}"#)),
            Value::Json(json!({"color": "red"}))
        );

        let stored = Value::from("2024-03-05 10:30:00");
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap();
        assert_eq!(CastType::DateTime.cast(&stored), Value::DateTime(expected));
        assert_eq!(CastType::Date.cast(&stored), Value::from("2024-03-05"));
        assert_eq!(CastType::Timestamp.cast(&stored), Value::Int(expected.timestamp()));
    }

    #[test]
    fn test_undeclared_cast_passes_through() {
        assert_eq!(apply(None, &Value::from("x")), Value::from("x"));
        assert_eq!(apply(Some("int"), &Value::from("7")), Value::Int(7));
    }

    #[test]
    fn test_misspelled_cast_leaves_value_unchanged() {
        assert_eq!(apply(Some("boolen"), &Value::from("1")), Value::from("1"));
        assert_eq!(apply(Some("decimal:two"), &Value::Float(1.25)), Value::Float(1.25));
    }
}
