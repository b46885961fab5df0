//! Output schemas and pre-deserialization normalization.
//!
//! Providers occasionally return numbers as strings or probabilities a hair
//! outside `[0, 1]`. Normalization repairs what is mechanically repairable,
//! guided by the declared schema, and rejects what is not (NaN, infinities,
//! missing required fields). Typed deserialization happens after this pass.

use serde::Serialize;
use serde_json::Value;

/// A declared output schema: a name plus a JSON-Schema object.
#[derive(Debug, Clone, Serialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Field names whose numeric values are clamped into `[0, 1]`.
const PROBABILITY_FIELDS: [&str; 2] = ["prediction_probability", "confidence"];

/// Normalize a raw output object against its schema.
///
/// - numeric strings in number/integer-typed positions are coerced;
/// - probability-like fields are clamped to `[0, 1]`;
/// - non-finite numbers are rejected;
/// - missing required fields are rejected.
pub fn normalize(value: &mut Value, schema: &Value) -> Result<(), String> {
    normalize_node(value, schema, None)?;
    check_required(value, schema)
}

fn normalize_node(value: &mut Value, schema: &Value, field: Option<&str>) -> Result<(), String> {
    let declared_type = schema.get("type").and_then(Value::as_str);

    match declared_type {
        Some("number") | Some("integer") => coerce_number(value, field)?,
        Some("object") => {
            if let (Value::Object(map), Some(props)) =
                (&mut *value, schema.get("properties").and_then(Value::as_object))
            {
                for (key, prop_schema) in props {
                    if let Some(child) = map.get_mut(key) {
                        normalize_node(child, prop_schema, Some(key))?;
                    }
                }
            }
        }
        Some("array") => {
            if let (Value::Array(items), Some(item_schema)) = (&mut *value, schema.get("items")) {
                for item in items {
                    normalize_node(item, item_schema, field)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn coerce_number(value: &mut Value, field: Option<&str>) -> Result<(), String> {
    // Coerce a numeric string in a number-typed position.
    if let Value::String(s) = value {
        let parsed: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("field {:?}: expected number, got string {s:?}", field))?;
        *value = serde_json::Number::from_f64(parsed)
            .map(Value::Number)
            .ok_or_else(|| format!("field {:?}: non-finite number {s:?}", field))?;
    }

    let Some(n) = value.as_f64() else {
        return match value {
            Value::Number(_) => Ok(()), // u64/i64 out of f64 range; leave as-is
            other => Err(format!("field {:?}: expected number, got {other}", field)),
        };
    };
    if !n.is_finite() {
        return Err(format!("field {:?}: non-finite number", field));
    }

    if let Some(name) = field {
        if PROBABILITY_FIELDS.contains(&name) {
            let clamped = n.clamp(0.0, 1.0);
            if clamped != n {
                *value = Value::Number(
                    serde_json::Number::from_f64(clamped).expect("clamped value is finite"),
                );
            }
        }
    }
    Ok(())
}

fn check_required(value: &Value, schema: &Value) -> Result<(), String> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let Some(map) = value.as_object() else {
        return Err("expected a JSON object at the top level".into());
    };
    for key in required.iter().filter_map(Value::as_str) {
        if !map.contains_key(key) {
            return Err(format!("missing required field {key:?}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "prediction_probability": {"type": "number"},
                "confidence": {"type": "number"},
                "reasoning": {"type": "string"},
                "key_factors": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["prediction_probability", "confidence", "reasoning"]
        })
    }

    #[test]
    fn test_numeric_string_coerced() {
        let mut value = json!({
            "prediction_probability": "0.62",
            "confidence": 0.7,
            "reasoning": "because"
        });
        normalize(&mut value, &schema()).unwrap();
        assert_eq!(value["prediction_probability"], json!(0.62));
    }

    #[test]
    fn test_probability_clamped() {
        let mut value = json!({
            "prediction_probability": 1.4,
            "confidence": -0.2,
            "reasoning": "overshoot"
        });
        normalize(&mut value, &schema()).unwrap();
        assert_eq!(value["prediction_probability"], json!(1.0));
        assert_eq!(value["confidence"], json!(0.0));
    }

    #[test]
    fn test_nan_rejected() {
        let mut value = json!({
            "prediction_probability": "NaN",
            "confidence": 0.5,
            "reasoning": "bad"
        });
        assert!(normalize(&mut value, &schema()).is_err());
    }

    #[test]
    fn test_missing_required_rejected() {
        let mut value = json!({"prediction_probability": 0.5, "confidence": 0.5});
        let err = normalize(&mut value, &schema()).unwrap_err();
        assert!(err.contains("reasoning"));
    }

    #[test]
    fn test_non_numeric_text_preserved() {
        // Strings in string-typed positions are never touched, even if they
        // look numeric.
        let mut value = json!({
            "prediction_probability": 0.5,
            "confidence": 0.5,
            "reasoning": "2024"
        });
        normalize(&mut value, &schema()).unwrap();
        assert_eq!(value["reasoning"], json!("2024"));
    }

    #[test]
    fn test_nested_array_normalized() {
        let nested = json!({
            "type": "object",
            "properties": {
                "factors": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"importance_score": {"type": "number"}},
                        "required": ["importance_score"]
                    }
                }
            },
            "required": ["factors"]
        });
        let mut value = json!({"factors": [{"importance_score": "8.0"}]});
        normalize(&mut value, &nested).unwrap();
        assert_eq!(value["factors"][0]["importance_score"], json!(8.0));
    }
}
