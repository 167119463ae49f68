//! Tolerant field decoders for layout-analysis JSON.
//!
//! Document AI responses change shape between API versions and processor
//! types, and protobuf-JSON adds its own quirks: zero values are omitted and
//! 64-bit integers arrive as decimal strings. Every field of the wire model
//! is decoded through one of these helpers so that a value of the wrong
//! shape becomes "absent" instead of rejecting the enclosing block.
//!
//! All helpers are meant for `#[serde(default, deserialize_with = "...")]`
//! so a missing key and a malformed value end up in the same place.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode any `T`, mapping `null` and shape mismatches to `None`.
pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(from_value(value).ok())
}

/// Decode a sequence element by element.
///
/// A non-array value yields an empty vector; array elements that fail to
/// decode are dropped without affecting their siblings.
pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// `serde_json::from_value` on a stack that grows as the value nests.
///
/// Blocks re-enter this module once per level, so every level gets its own
/// check against the remaining stack.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    T::deserialize(serde_stacker::Deserializer::new(value))
}

/// Decode an integer given as a JSON number or a numeric string.
pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_integer(&value))
}

/// Decode a finite float given as a JSON number or a numeric string.
pub fn float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|f| f.is_finite()))
}

/// Decode a string; numbers are accepted and rendered in decimal.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "integer")]
        count: Option<i64>,
        #[serde(default, deserialize_with = "float")]
        ratio: Option<f64>,
        #[serde(default, deserialize_with = "string")]
        name: Option<String>,
        #[serde(default, deserialize_with = "seq")]
        items: Vec<u32>,
        #[serde(default, deserialize_with = "option")]
        nested: Option<Inner>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Inner {
        flag: bool,
    }

    fn probe(value: Value) -> Probe {
        serde_json::from_value(value).expect("probe always decodes")
    }

    #[test]
    fn integers_accept_strings_and_numbers() {
        assert_eq!(probe(json!({"count": "42"})).count, Some(42));
        assert_eq!(probe(json!({"count": 7})).count, Some(7));
        assert_eq!(probe(json!({"count": 3.0})).count, Some(3));
        assert_eq!(probe(json!({"count": 3.5})).count, None);
        assert_eq!(probe(json!({"count": "abc"})).count, None);
        assert_eq!(probe(json!({"count": [1]})).count, None);
    }

    #[test]
    fn floats_reject_garbage() {
        assert_eq!(probe(json!({"ratio": 0.25})).ratio, Some(0.25));
        assert_eq!(probe(json!({"ratio": "0.5"})).ratio, Some(0.5));
        assert_eq!(probe(json!({"ratio": "NaN"})).ratio, None);
        assert_eq!(probe(json!({"ratio": {}})).ratio, None);
    }

    #[test]
    fn strings_accept_numbers() {
        assert_eq!(probe(json!({"name": 12})).name.as_deref(), Some("12"));
        assert_eq!(probe(json!({"name": null})).name, None);
        assert_eq!(probe(json!({"name": false})).name, None);
    }

    #[test]
    fn sequences_drop_bad_elements_only() {
        assert_eq!(probe(json!({"items": [1, "x", 3, -4]})).items, vec![1, 3]);
        assert!(probe(json!({"items": "not a list"})).items.is_empty());
        assert!(probe(json!({})).items.is_empty());
    }

    #[test]
    fn options_map_shape_mismatch_to_none() {
        assert_eq!(
            probe(json!({"nested": {"flag": true}})).nested,
            Some(Inner { flag: true })
        );
        assert_eq!(probe(json!({"nested": "oops"})).nested, None);
        assert_eq!(probe(json!({"nested": null})).nested, None);
    }
}
