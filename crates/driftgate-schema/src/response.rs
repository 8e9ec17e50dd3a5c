use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::OperationKind;

/// Extra bookkeeping fields carried alongside every response, per spec §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseExtraFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_requested: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final_chunk: Option<bool>,
}

/// The canonical response, tagged to match the request's operation kind.
/// `body` holds `choices`/`data`/usage and whatever else the operation
/// produces; adapters and the accumulator interpret it by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub kind: OperationKind,
    pub id: String,
    pub created: i64,
    pub model: String,
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(default)]
    pub extra_fields: ResponseExtraFields,
}
