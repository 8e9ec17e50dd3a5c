use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-request metadata threaded through the whole pipeline: deadlines,
/// tracing ids, governance filters, and free-form observability tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMap {
    pub request_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Governance filter: when non-empty, the key selector only considers
    /// keys whose id is in this set.
    #[serde(default)]
    pub include_only_key_ids: BTreeSet<Uuid>,
    /// A per-request direct key (BYOK) that bypasses key selection entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_override: Option<bool>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ContextMap {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            deadline_ms: None,
            trace_id: None,
            session_id: None,
            generation_id: None,
            include_only_key_ids: BTreeSet::new(),
            direct_key: None,
            circuit_breaker_override: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn governs_key(&self, key_id: Uuid) -> bool {
        self.include_only_key_ids.is_empty() || self.include_only_key_ids.contains(&key_id)
    }
}
