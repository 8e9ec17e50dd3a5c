use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An incremental piece of a streamed response (spec §3, §4.5).
///
/// Invariants upheld by producers, not enforced by this type: chunks for a
/// given `request_id` arrive in `chunk_index` order on a single channel;
/// exactly one terminal chunk carries either `finish_reason` or
/// `error_details`; the channel is closed after the terminal chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub request_id: Uuid,
    pub chunk_index: u64,
    pub delta: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
}

impl StreamChunk {
    /// Per Design Note (spec §9): the terminal signal is carried in-chunk
    /// (`finish_reason`, `error_details`, or `usage`) rather than via an
    /// out-of-band flag.
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some() || self.error_details.is_some() || self.usage.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> StreamChunk {
        StreamChunk {
            request_id: Uuid::nil(),
            chunk_index: 0,
            delta: Value::Null,
            finish_reason: None,
            usage: None,
            timestamp_ms: 0,
            error_details: None,
        }
    }

    #[test]
    fn delta_only_chunk_is_not_terminal() {
        assert!(!chunk().is_terminal());
    }

    #[test]
    fn finish_reason_marks_terminal() {
        let mut c = chunk();
        c.finish_reason = Some("stop".to_string());
        assert!(c.is_terminal());
    }

    #[test]
    fn usage_only_chunk_is_terminal() {
        let mut c = chunk();
        c.usage = Some(serde_json::json!({"total_tokens": 10}));
        assert!(c.is_terminal());
    }

    #[test]
    fn error_details_marks_terminal() {
        let mut c = chunk();
        c.error_details = Some(serde_json::json!({"message": "boom"}));
        assert!(c.is_terminal());
    }
}
