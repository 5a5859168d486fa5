use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::FieldValue;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Firestore REST `Value`: an object with exactly one `<type>Value` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(serde_json::Value),
    BooleanValue(bool),
    /// int64 travels as a decimal string.
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(DateTime<Utc>),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(serde_json::Value),
    MapValue(serde_json::Value),
}

impl Value {
    /// Domain view of a wire value. Composite and binary types are not used
    /// by the dashboard documents and map to `None`.
    pub fn into_field(self) -> Option<FieldValue> {
        match self {
            Value::NullValue(_) => Some(FieldValue::Null),
            Value::BooleanValue(b) => Some(FieldValue::Bool(b)),
            Value::IntegerValue(s) => s.parse().ok().map(FieldValue::Integer),
            Value::DoubleValue(d) => Some(FieldValue::Double(d)),
            Value::TimestampValue(t) => Some(FieldValue::Timestamp(t)),
            Value::StringValue(s) => Some(FieldValue::String(s)),
            Value::BytesValue(_)
            | Value::ReferenceValue(_)
            | Value::GeoPointValue(_)
            | Value::ArrayValue(_)
            | Value::MapValue(_) => None,
        }
    }

    /// Wire form of a plain field. `ServerTimestamp` is a transform, not a
    /// value, and yields `None`.
    pub fn from_field(field: FieldValue) -> Option<Self> {
        match field {
            FieldValue::Null => Some(Value::NullValue(serde_json::Value::Null)),
            FieldValue::Bool(b) => Some(Value::BooleanValue(b)),
            FieldValue::Integer(i) => Some(Value::IntegerValue(i.to_string())),
            FieldValue::Double(d) => Some(Value::DoubleValue(d)),
            FieldValue::String(s) => Some(Value::StringValue(s)),
            FieldValue::Timestamp(t) => Some(Value::TimestampValue(t)),
            FieldValue::ServerTimestamp => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub update_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub update: Document,
    pub update_mask: DocumentMask,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,
    pub current_document: Precondition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    pub set_to_server_value: ServerValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerValue {
    RequestTime,
}

#[derive(Debug, Serialize)]
pub struct Precondition {
    pub exists: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
pub struct ErrorStatus {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_fixture_decodes() {
        let json = r#"{
            "name": "projects/vermimometer/databases/(default)/documents/sensorData/temperature1",
            "fields": {
                "value": { "doubleValue": 23.4 },
                "timestamp": { "timestampValue": "2025-03-01T10:15:30.123456Z" }
            },
            "createTime": "2025-01-01T00:00:00Z",
            "updateTime": "2025-03-01T10:15:30.200Z"
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.fields["value"], Value::DoubleValue(23.4));
        assert!(matches!(doc.fields["timestamp"], Value::TimestampValue(_)));
        assert!(doc.update_time.is_some());
    }

    #[test]
    fn integer_values_arrive_as_strings() {
        let v: Value = serde_json::from_str(r#"{ "integerValue": "812" }"#).unwrap();
        assert_eq!(v.into_field(), Some(FieldValue::Integer(812)));
    }

    #[test]
    fn null_and_composite_values_decode() {
        let null: Value = serde_json::from_str(r#"{ "nullValue": null }"#).unwrap();
        assert_eq!(null.into_field(), Some(FieldValue::Null));

        let map: Value = serde_json::from_str(r#"{ "mapValue": { "fields": {} } }"#).unwrap();
        assert_eq!(map.into_field(), None);
    }

    #[test]
    fn document_without_fields_decodes() {
        let doc: Document =
            serde_json::from_str(r#"{ "name": "projects/p/databases/(default)/documents/controlMod/Pump" }"#)
                .unwrap();
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn commit_request_serializes_in_wire_shape() {
        let req = CommitRequest {
            writes: vec![Write {
                update: Document {
                    name: "projects/p/databases/(default)/documents/controlMod/Efan".into(),
                    fields: BTreeMap::from([("status".to_owned(), Value::BooleanValue(true))]),
                    create_time: None,
                    update_time: None,
                },
                update_mask: DocumentMask {
                    field_paths: vec!["status".into()],
                },
                update_transforms: vec![FieldTransform {
                    field_path: "turnedOnTimestamp".into(),
                    set_to_server_value: ServerValue::RequestTime,
                }],
                current_document: Precondition { exists: true },
            }],
        };

        let json = serde_json::to_value(&req).unwrap();
        let write = &json["writes"][0];
        assert_eq!(write["update"]["fields"]["status"]["booleanValue"], true);
        assert_eq!(write["updateMask"]["fieldPaths"][0], "status");
        assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
        assert_eq!(write["currentDocument"]["exists"], true);
        assert!(write["update"].get("updateTime").is_none());
    }

    #[test]
    fn error_response_decodes() {
        let json = r#"{ "error": { "code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED" } }"#;
        let err: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error.code, 403);
        assert_eq!(err.error.status, "PERMISSION_DENIED");
    }
}
