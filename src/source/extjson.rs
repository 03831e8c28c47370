//! Flattening of MongoDB Extended JSON as written by `mongoexport`
//!
//! Both relaxed and canonical modes wrap BSON types in single-key objects
//! (`{"$oid": ..}`, `{"$date": ..}`, `{"$numberLong": ..}`). The loader
//! flattens them into plain JSON so documents deserialize into ordinary
//! structs: ids become hex strings, dates RFC 3339 strings, numbers numbers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// Recursively replace Extended JSON wrappers with plain values
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => normalize_object(map),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

fn normalize_object(map: Map<String, Value>) -> Value {
    if map.len() == 1 {
        if let Some(flat) = map.iter().next().and_then(|(k, v)| unwrap_wrapper(k, v)) {
            return flat;
        }
    }

    Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
}

fn unwrap_wrapper(key: &str, inner: &Value) -> Option<Value> {
    match key {
        "$oid" | "$symbol" => inner.as_str().map(|s| Value::String(s.to_string())),
        "$date" => date_value(inner),
        "$numberLong" | "$numberInt" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|n| Value::Number(n.into())),
        "$numberDouble" | "$numberDecimal" => inner
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .map(|f| Number::from_f64(f).map_or(Value::Null, Value::Number)),
        _ => None,
    }
}

fn date_value(inner: &Value) -> Option<Value> {
    match inner {
        Value::String(s) => Some(Value::String(s.clone())),
        Value::Number(n) => n.as_i64().and_then(millis_to_rfc3339),
        Value::Object(map) => map
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(millis_to_rfc3339),
        _ => None,
    }
}

fn millis_to_rfc3339(millis: i64) -> Option<Value> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
}
