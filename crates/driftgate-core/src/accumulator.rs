use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use driftgate_schema::StreamChunk;
use serde_json::Value;
use uuid::Uuid;

/// Default eviction threshold for accumulators with no activity (spec §4.5:
/// "Accumulators with no activity for ≥ 5 minutes are dropped").
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default)]
struct ToolCall {
    id: String,
    arguments: String,
}

/// The whole-response view reconstructed from ordered delta chunks.
#[derive(Debug, Clone, Default)]
pub struct AssembledResponse {
    pub role: Option<String>,
    pub content: String,
    pub refusal: String,
    pub tool_calls: Vec<(String, String)>,
    pub usage: Option<Value>,
    pub finish_reason: Option<String>,
}

struct AccumulatorState {
    chunks: Vec<StreamChunk>,
    assembled: AssembledResponse,
    tool_call_index: HashMap<String, usize>,
    first_seen: Instant,
    last_activity: Instant,
    closed: bool,
}

impl AccumulatorState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            chunks: Vec::new(),
            assembled: AssembledResponse::default(),
            tool_call_index: HashMap::new(),
            first_seen: now,
            last_activity: now,
            closed: false,
        }
    }

    fn apply(&mut self, chunk: StreamChunk) {
        self.last_activity = Instant::now();

        // Contract is ordered by chunk_index; resort defensively if an
        // out-of-order arrival is observed.
        let insert_at = self
            .chunks
            .iter()
            .position(|c| c.chunk_index > chunk.chunk_index)
            .unwrap_or(self.chunks.len());
        let is_terminal = chunk.is_terminal();
        self.chunks.insert(insert_at, chunk.clone());

        if let Some(role) = chunk.delta.get("role").and_then(Value::as_str) {
            if self.assembled.role.is_none() && !role.is_empty() {
                self.assembled.role = Some(role.to_string());
            }
        }
        if let Some(content) = chunk.delta.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                self.assembled.content.push_str(content);
            }
        }
        if let Some(refusal) = chunk.delta.get("refusal").and_then(Value::as_str) {
            if !refusal.is_empty() {
                self.assembled.refusal.push_str(refusal);
            }
        }
        if let Some(calls) = chunk.delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
                let args = call
                    .get("function")
                    .and_then(|f| f.get("arguments"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if id.is_empty() {
                    continue;
                }
                if let Some(&idx) = self.tool_call_index.get(id) {
                    self.assembled.tool_calls[idx].1.push_str(args);
                } else {
                    self.tool_call_index
                        .insert(id.to_string(), self.assembled.tool_calls.len());
                    self.assembled
                        .tool_calls
                        .push((id.to_string(), args.to_string()));
                }
            }
        }
        if let Some(usage) = &chunk.usage {
            self.assembled.usage = Some(usage.clone());
        }
        if let Some(reason) = &chunk.finish_reason {
            self.assembled.finish_reason = Some(reason.clone());
        }

        if is_terminal {
            self.closed = true;
        }
    }

    fn is_stale(&self, stale_timeout: Duration) -> bool {
        self.last_activity.elapsed() >= stale_timeout
    }
}

/// Concurrent map of in-flight accumulators keyed by request id.
pub struct AccumulatorStore {
    states: Mutex<HashMap<Uuid, AccumulatorState>>,
    stale_timeout: Duration,
}

impl Default for AccumulatorStore {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIMEOUT)
    }
}

impl AccumulatorStore {
    pub fn new(stale_timeout: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            stale_timeout,
        }
    }

    /// Feed a chunk into its request's accumulator, creating one on first
    /// arrival.
    pub fn ingest(&self, chunk: StreamChunk) {
        let mut states = self.states.lock().unwrap();
        let entry = states
            .entry(chunk.request_id)
            .or_insert_with(AccumulatorState::new);
        entry.apply(chunk);
    }

    /// Read out the assembled response, if the accumulator has seen its
    /// terminal chunk.
    pub fn assembled_if_closed(&self, request_id: Uuid) -> Option<AssembledResponse> {
        let states = self.states.lock().unwrap();
        let state = states.get(&request_id)?;
        if state.closed {
            Some(state.assembled.clone())
        } else {
            None
        }
    }

    /// Explicit cleanup, invoked by the owning plugin on terminal chunk or
    /// error.
    pub fn evict(&self, request_id: Uuid) {
        self.states.lock().unwrap().remove(&request_id);
    }

    /// Periodic sweep dropping accumulators with no activity for the stale
    /// timeout.
    pub fn sweep_stale(&self) {
        let mut states = self.states.lock().unwrap();
        states.retain(|_, state| !state.is_stale(self.stale_timeout));
    }

    pub fn first_seen(&self, request_id: Uuid) -> Option<Instant> {
        self.states
            .lock()
            .unwrap()
            .get(&request_id)
            .map(|s| s.first_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(id: Uuid, idx: u64, delta: Value, finish: Option<&str>) -> StreamChunk {
        StreamChunk {
            request_id: id,
            chunk_index: idx,
            delta,
            finish_reason: finish.map(str::to_string),
            usage: None,
            timestamp_ms: 0,
            error_details: None,
        }
    }

    #[test]
    fn assembles_role_and_content_in_order() {
        let store = AccumulatorStore::default();
        let id = Uuid::new_v4();
        store.ingest(chunk(id, 0, json!({"role": "assistant"}), None));
        store.ingest(chunk(id, 1, json!({"content": "hel"}), None));
        store.ingest(chunk(id, 2, json!({"content": "lo"}), Some("stop")));

        let assembled = store.assembled_if_closed(id).expect("closed");
        assert_eq!(assembled.role.as_deref(), Some("assistant"));
        assert_eq!(assembled.content, "hello");
        assert_eq!(assembled.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn not_closed_until_terminal_chunk() {
        let store = AccumulatorStore::default();
        let id = Uuid::new_v4();
        store.ingest(chunk(id, 0, json!({"content": "hi"}), None));
        assert!(store.assembled_if_closed(id).is_none());
    }

    #[test]
    fn out_of_order_arrival_is_resorted() {
        let store = AccumulatorStore::default();
        let id = Uuid::new_v4();
        store.ingest(chunk(id, 1, json!({"content": "lo"}), Some("stop")));
        store.ingest(chunk(id, 0, json!({"content": "hel"}), None));

        let assembled = store.assembled_if_closed(id).expect("closed");
        assert_eq!(assembled.content, "hello");
    }

    #[test]
    fn tool_calls_matched_by_id_and_ordered_by_first_appearance() {
        let store = AccumulatorStore::default();
        let id = Uuid::new_v4();
        store.ingest(chunk(
            id,
            0,
            json!({"tool_calls": [{"id": "call_1", "function": {"arguments": "{\"a\":"}}]}),
            None,
        ));
        store.ingest(chunk(
            id,
            1,
            json!({"tool_calls": [{"id": "call_2", "function": {"arguments": "{}"}}]}),
            None,
        ));
        store.ingest(chunk(
            id,
            2,
            json!({"tool_calls": [{"id": "call_1", "function": {"arguments": "1}"}}]}),
            Some("tool_calls"),
        ));

        let assembled = store.assembled_if_closed(id).expect("closed");
        assert_eq!(assembled.tool_calls.len(), 2);
        assert_eq!(assembled.tool_calls[0].0, "call_1");
        assert_eq!(assembled.tool_calls[0].1, "{\"a\":1}");
        assert_eq!(assembled.tool_calls[1].0, "call_2");
    }

    #[test]
    fn last_usage_wins() {
        let store = AccumulatorStore::default();
        let id = Uuid::new_v4();
        let mut first = chunk(id, 0, json!({"content": "a"}), None);
        first.usage = Some(json!({"total_tokens": 1}));
        let mut last = chunk(id, 1, json!({"content": "b"}), Some("stop"));
        last.usage = Some(json!({"total_tokens": 99}));
        store.ingest(first);
        store.ingest(last);

        let assembled = store.assembled_if_closed(id).expect("closed");
        assert_eq!(assembled.usage, Some(json!({"total_tokens": 99})));
    }

    #[test]
    fn evict_removes_state() {
        let store = AccumulatorStore::default();
        let id = Uuid::new_v4();
        store.ingest(chunk(id, 0, json!({"content": "a"}), Some("stop")));
        assert!(store.assembled_if_closed(id).is_some());
        store.evict(id);
        assert!(store.assembled_if_closed(id).is_none());
    }

    #[test]
    fn sweep_stale_drops_inactive_accumulators() {
        let store = AccumulatorStore::new(Duration::from_millis(1));
        let id = Uuid::new_v4();
        store.ingest(chunk(id, 0, json!({"content": "a"}), None));
        std::thread::sleep(Duration::from_millis(5));
        store.sweep_stale();
        assert!(store.first_seen(id).is_none());
    }

    #[test]
    fn permutation_followed_by_resort_matches_in_order_feed() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        let store_a = AccumulatorStore::default();
        let store_b = AccumulatorStore::default();

        let in_order = vec![
            chunk(id_a, 0, json!({"role": "assistant"}), None),
            chunk(id_a, 1, json!({"content": "hel"}), None),
            chunk(id_a, 2, json!({"content": "lo"}), Some("stop")),
        ];
        for c in in_order {
            store_a.ingest(c);
        }

        let mut permuted = vec![
            chunk(id_b, 2, json!({"content": "lo"}), Some("stop")),
            chunk(id_b, 0, json!({"role": "assistant"}), None),
            chunk(id_b, 1, json!({"content": "hel"}), None),
        ];
        permuted.sort_by_key(|c| c.chunk_index);
        for c in permuted {
            store_b.ingest(c);
        }

        let a = store_a.assembled_if_closed(id_a).unwrap();
        let b = store_b.assembled_if_closed(id_b).unwrap();
        assert_eq!(a.content, b.content);
        assert_eq!(a.role, b.role);
        assert_eq!(a.finish_reason, b.finish_reason);
    }
}
