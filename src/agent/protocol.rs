//! Agent wire messages (OpAMP, proto3 JSON encoding)
//!
//! Only the fields the registry reads are modelled; unknown fields are
//! ignored. 64-bit integers arrive either as JSON numbers or as decimal
//! strings, bytes fields as base64.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Custom message type carrying an OTLP/JSON `LogsData` document
pub const OTLP_LOGS_MESSAGE_TYPE: &str = "otlp.logs";

/// Agent → server frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentToServer {
    pub instance_uid: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub sequence_num: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_description: Option<AgentDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<CustomMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_disconnect: Option<AgentDisconnect>,
}

/// Server → agent frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerToAgent {
    pub instance_uid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDescription {
    pub identifying_attributes: Vec<KeyValue>,
    pub non_identifying_attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDisconnect {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomMessage {
    pub capability: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl CustomMessage {
    /// Decode `data` as OTLP logs; `None` for other message types
    pub fn logs(&self) -> Option<serde_json::Result<LogsData>> {
        (self.kind == OTLP_LOGS_MESSAGE_TYPE).then(|| serde_json::from_slice(&self.data))
    }
}

/// OTLP attribute
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnyValue {
                string_value: Some(value.into()),
                ..Default::default()
            },
        }
    }
}

/// OTLP attribute value (scalar variants only)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnyValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_i64")]
    pub int_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
}

impl AnyValue {
    /// Scalar rendered as a string
    pub fn as_text(&self) -> Option<String> {
        if let Some(s) = &self.string_value {
            return Some(s.clone());
        }
        self.int_value
            .map(|v| v.to_string())
            .or_else(|| self.bool_value.map(|v| v.to_string()))
            .or_else(|| self.double_value.map(|v| v.to_string()))
    }
}

/// Find `key` in an attribute list and render its value
pub fn attribute(attributes: &[KeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_text())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogsData {
    pub resource_logs: Vec<ResourceLogs>,
}

impl LogsData {
    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.resource_logs
            .iter()
            .flat_map(|r| r.scope_logs.iter())
            .flat_map(|s| s.log_records.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLogs {
    pub resource: Resource,
    pub scope_logs: Vec<ScopeLogs>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeLogs {
    pub log_records: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogRecord {
    pub time_unix_nano: String,
    pub severity_text: String,
    pub body: AnyValue,
    pub attributes: Vec<KeyValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

fn lenient_u64<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    match NumberOrString::<u64>::deserialize(de)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    match Option::<NumberOrString<i64>>::deserialize(de)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(de)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
