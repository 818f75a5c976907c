//! Lenient deserializers for gateway payloads.
//!
//! Market data values arrive as JSON numbers on some builds and as numeric
//! strings (`"101.50"`, `"1,200"`, `"C101.5"` for closing prices) on others.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

pub(crate) fn flexible_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches(['C', 'H'])
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}
