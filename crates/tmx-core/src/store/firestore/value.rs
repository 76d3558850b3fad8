//! Conversion between plain JSON fields and Firestore REST typed values.

use chrono::DateTime;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::store::Fields;

/// Encode plain fields as a Firestore `fields` map.
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => number.as_i64().map_or_else(
            || json!({ "doubleValue": number.as_f64().unwrap_or_default() }),
            |integer| json!({ "integerValue": integer.to_string() }),
        ),
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({
            "mapValue": { "fields": encode_fields(map) }
        }),
    }
}

/// Decode a Firestore `fields` map (absent for empty documents).
pub fn decode_fields(fields: Option<&Value>) -> Result<Fields> {
    let Some(fields) = fields else {
        return Ok(Fields::new());
    };
    let map = fields
        .as_object()
        .ok_or_else(|| invalid("fields must be an object"))?;

    map.iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode one typed value. Timestamps become Unix milliseconds.
pub fn decode_value(value: &Value) -> Result<Value> {
    let typed = value
        .as_object()
        .and_then(|map| map.iter().next())
        .map(|(kind, inner)| (kind.as_str(), inner))
        .ok_or_else(|| invalid("typed value must be a single-key object"))?;

    match typed {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", Value::Bool(flag)) => Ok(Value::Bool(*flag)),
        ("integerValue", Value::String(raw)) => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(&format!("bad integerValue '{raw}'"))),
        ("integerValue", Value::Number(number)) => Ok(Value::Number(number.clone())),
        ("doubleValue", Value::Number(number)) => Ok(Value::Number(number.clone())),
        ("timestampValue", Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
            .map(|timestamp| Value::from(timestamp.timestamp_millis()))
            .map_err(|_| invalid(&format!("bad timestampValue '{raw}'"))),
        ("stringValue" | "referenceValue" | "bytesValue", Value::String(raw)) => {
            Ok(Value::String(raw.clone()))
        }
        ("geoPointValue", point) => Ok(point.clone()),
        ("arrayValue", array) => {
            let values = array
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        ("mapValue", map) => Ok(Value::Object(decode_fields(map.get("fields"))?)),
        (kind, _) => Err(invalid(&format!("unsupported value type '{kind}'"))),
    }
}

fn invalid(message: &str) -> Error {
    Error::Store(format!("invalid Firestore value: {message}"))
}

/// Build a `structuredQuery.where` clause from a conjunction of filters.
pub fn encode_where(filters: &[crate::store::FieldFilter]) -> Option<Value> {
    let mut encoded = filters.iter().map(encode_filter).collect::<Vec<_>>();
    match encoded.len() {
        0 => None,
        1 => encoded.pop(),
        _ => Some(json!({
            "compositeFilter": { "op": "AND", "filters": encoded }
        })),
    }
}

fn encode_filter(filter: &crate::store::FieldFilter) -> Value {
    use crate::store::FieldFilter;

    let (field, op, value) = match filter {
        FieldFilter::Equal { field, value } => (field, "EQUAL", value),
        FieldFilter::ArrayContains { field, value } => (field, "ARRAY_CONTAINS", value),
    };
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": encode_value(value),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldFilter;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_integers_as_strings_and_nests_containers() {
        let fields = json!({
            "count": 3,
            "ratio": 0.5,
            "tags": ["a"],
            "content": { "type": "doc" }
        });
        let encoded = encode_fields(fields.as_object().unwrap());

        assert_eq!(encoded["count"], json!({ "integerValue": "3" }));
        assert_eq!(encoded["ratio"], json!({ "doubleValue": 0.5 }));
        assert_eq!(
            encoded["tags"],
            json!({ "arrayValue": { "values": [{ "stringValue": "a" }] } })
        );
        assert_eq!(
            encoded["content"],
            json!({ "mapValue": { "fields": { "type": { "stringValue": "doc" } } } })
        );
    }

    #[test]
    fn decodes_timestamps_to_unix_millis() {
        let decoded =
            decode_value(&json!({ "timestampValue": "2024-01-02T03:04:05.678Z" })).unwrap();
        assert_eq!(decoded, json!(1_704_164_645_678_i64));
    }

    #[test]
    fn decodes_empty_containers() {
        assert_eq!(decode_value(&json!({ "arrayValue": {} })).unwrap(), json!([]));
        assert_eq!(decode_value(&json!({ "mapValue": {} })).unwrap(), json!({}));
    }

    #[test]
    fn decode_reverses_encode_for_note_fields() {
        let fields = json!({
            "title": "Hello",
            "isPinned": false,
            "assignedTo": ["bob@example.com"],
            "createdBy": { "uid": "u1", "email": null }
        });
        let encoded = encode_fields(fields.as_object().unwrap());
        let decoded = decode_fields(Some(&encoded)).unwrap();
        assert_eq!(Value::Object(decoded), fields);
    }

    #[test]
    fn rejects_unknown_value_types() {
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
        assert!(decode_value(&json!("bare")).is_err());
    }

    #[test]
    fn where_clause_wraps_multiple_filters_in_and() {
        assert_eq!(encode_where(&[]), None);

        let single = encode_where(&[FieldFilter::equal("isDeleted", false)]).unwrap();
        assert_eq!(single["fieldFilter"]["op"], json!("EQUAL"));

        let composite = encode_where(&[
            FieldFilter::equal("isDeleted", false),
            FieldFilter::array_contains("assignedTo", "bob@example.com"),
        ])
        .unwrap();
        assert_eq!(composite["compositeFilter"]["op"], json!("AND"));
        assert_eq!(
            composite["compositeFilter"]["filters"][1]["fieldFilter"]["op"],
            json!("ARRAY_CONTAINS")
        );
    }
}
