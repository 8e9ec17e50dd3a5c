use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

/// Matches the teacher's idle-connection keepalive cadence: long-running
/// streams otherwise look dead to intermediate proxies and load balancers.
pub const SSE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const SSE_HEARTBEAT_FRAME: &[u8] = b": keep-alive\n\n";

/// Which dialect's SSE framing convention a stream should be re-encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectFraming {
    OpenAi,
    Anthropic,
    GenAi,
}

/// Bare `data: <json>\n\n` framing (OpenAI, GenAI `alt=sse`).
pub fn encode_data_frame(value: &Value) -> Bytes {
    Bytes::from(format!("data: {value}\n\n"))
}

/// OpenAI's terminal sentinel frame.
pub fn encode_openai_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Anthropic's named-event framing: `event: <type>\ndata: <json>\n\n`.
pub fn encode_named_frame(event: &str, value: &Value) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {value}\n\n"))
}

/// Spawns a task that forwards `upstream_rx` verbatim, interleaving a
/// heartbeat comment frame on ticks when nothing else arrived, so the
/// downstream connection never goes idle for longer than the heartbeat
/// interval.
pub fn wrap_with_heartbeat(mut upstream_rx: mpsc::Receiver<Bytes>) -> mpsc::Receiver<Bytes> {
    let (tx, rx) = mpsc::channel::<Bytes>(32);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SSE_HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                maybe_chunk = upstream_rx.recv() => {
                    let Some(chunk) = maybe_chunk else {
                        break;
                    };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if tx.send(Bytes::from_static(SSE_HEARTBEAT_FRAME)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_frame_is_bare_data_line() {
        let frame = encode_data_frame(&json!({"delta": "hi"}));
        assert_eq!(frame.as_ref(), b"data: {\"delta\":\"hi\"}\n\n");
    }

    #[test]
    fn named_frame_includes_event_line() {
        let frame = encode_named_frame("content_block_delta", &json!({"delta": "hi"}));
        assert_eq!(frame.as_ref(), b"event: content_block_delta\ndata: {\"delta\":\"hi\"}\n\n");
    }

    #[test]
    fn openai_done_is_the_literal_sentinel() {
        assert_eq!(encode_openai_done().as_ref(), b"data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn heartbeat_wrapper_forwards_upstream_bytes_untouched() {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        let mut wrapped = wrap_with_heartbeat(rx);
        tx.send(Bytes::from_static(b"data: hi\n\n")).await.unwrap();
        let first = wrapped.recv().await.unwrap();
        assert_eq!(first.as_ref(), b"data: hi\n\n");
        drop(tx);
        assert!(wrapped.recv().await.is_none());
    }
}
