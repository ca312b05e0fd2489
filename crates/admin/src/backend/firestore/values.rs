//! Conversion between plain JSON and Firestore typed values.
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"stringValue": "x"}`, `{"integerValue": "5"}`, ...). Integers are
//! transported as strings.

use serde_json::{Map, Value, json};

/// Convert a JSON object into a Firestore `fields` map.
///
/// Returns `None` if `data` is not a JSON object.
#[must_use]
pub fn to_fields(data: &Value) -> Option<Map<String, Value>> {
    data.as_object().map(|object| {
        object
            .iter()
            .map(|(key, value)| (key.clone(), to_typed(value)))
            .collect()
    })
}

/// Convert a Firestore `fields` map back into a plain JSON object.
#[must_use]
pub fn from_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), from_typed(value)))
            .collect(),
    )
}

/// Wrap a plain JSON value in its Firestore type tag.
#[must_use]
pub fn to_typed(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_typed).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({
            "mapValue": { "fields": to_fields(value).unwrap_or_default() }
        }),
    }
}

/// Unwrap a Firestore typed value into plain JSON.
///
/// Unknown or malformed tags become `null`; the record deserializer decides
/// whether that makes the document unusable.
#[must_use]
pub fn from_typed(value: &Value) -> Value {
    let Some((tag, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };

    match tag.as_str() {
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue"
        | "referenceValue" | "bytesValue" | "geoPointValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map_or(Value::Null, Value::from),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(from_typed).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map_or_else(|| Value::Object(Map::new()), from_fields),
        _ => Value::Null,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_fields_are_tagged() {
        let fields = to_fields(&json!({
            "name": "Pen",
            "date": 1_700_000_000_000_i64,
            "availableUnits": 5,
        }))
        .unwrap();

        assert_eq!(fields["name"], json!({"stringValue": "Pen"}));
        assert_eq!(fields["date"], json!({"integerValue": "1700000000000"}));
        assert_eq!(fields["availableUnits"], json!({"integerValue": "5"}));
    }

    #[test]
    fn test_non_object_has_no_fields() {
        assert!(to_fields(&json!(["not", "a", "document"])).is_none());
    }

    #[test]
    fn test_nested_values() {
        let typed = to_typed(&json!({"tags": ["a", 1.5], "meta": {"ok": true}}));
        assert_eq!(
            typed,
            json!({"mapValue": {"fields": {
                "tags": {"arrayValue": {"values": [
                    {"stringValue": "a"},
                    {"doubleValue": 1.5}
                ]}},
                "meta": {"mapValue": {"fields": {"ok": {"booleanValue": true}}}}
            }}})
        );
        assert_eq!(
            from_typed(&typed),
            json!({"tags": ["a", 1.5], "meta": {"ok": true}})
        );
    }

    #[test]
    fn test_from_fields_handles_server_shapes() {
        let fields = json!({
            "categoryName": {"stringValue": "Books"},
            "empty": {"arrayValue": {}},
            "nothing": {"nullValue": null},
            "count": {"integerValue": "12"},
            "weird": {"unknownValue": 1},
        });

        assert_eq!(
            from_fields(fields.as_object().unwrap()),
            json!({
                "categoryName": "Books",
                "empty": [],
                "nothing": null,
                "count": 12,
                "weird": null,
            })
        );
    }
}
