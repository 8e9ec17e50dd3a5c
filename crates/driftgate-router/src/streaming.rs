use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use driftgate_core::{
    AccumulatorStore, GatewayError, KeySelector, SelectedKey, http_failure_to_gateway_error,
    transport_failure_to_gateway_error,
};
use driftgate_protocol::sse::{SseEvent, SseParser};
use driftgate_provider_core::{UpstreamBody, UpstreamCtx, UpstreamProvider};
use driftgate_schema::{CanonicalError, ErrorKind, Request};
use tokio::sync::mpsc;
use uuid::Uuid;


use crate::sse::{DialectFraming, encode_data_frame, encode_named_frame, encode_openai_done};
use crate::state::AppState;

/// Runs one streaming request outside the `Pipeline`: key selection and
/// circuit-breaker bookkeeping happen here directly against the same
/// `Arc<CircuitBreaker>` the pipeline uses for its own (non-streaming)
/// attempts at this provider, since a long-lived SSE connection can't fit
/// through `WorkerPool::submit`'s `Result<Response, _>` return shape.
///
/// Returns a channel of already-reframed SSE byte frames; the caller wraps
/// it with a heartbeat and serves it as the response body.
pub async fn dispatch_streaming(
    state: &AppState,
    provider: String,
    request: Request,
    framing: DialectFraming,
) -> Result<mpsc::Receiver<Bytes>, CanonicalError> {
    let runtime = state.streaming.get(&provider).ok_or_else(|| {
        CanonicalError::new(ErrorKind::InvalidRequest, format!("unknown provider: {provider}"))
    })?;

    let key = KeySelector::select(&runtime.keys, &request.header.model, &request.header.context)
        .map_err(GatewayError::into_canonical)?;

    if !runtime.circuit_breaker.try_acquire() {
        return Err(GatewayError::CircuitOpen.into_canonical());
    }

    let started = Instant::now();

    let adapter = match state.registry.get(&provider) {
        Some(adapter) => adapter,
        None => {
            runtime.circuit_breaker.record(false, started.elapsed());
            return Err(
                GatewayError::InvalidRequest(format!("no adapter registered for {provider}"))
                    .into_canonical(),
            );
        }
    };

    let provider_specific = match &key {
        SelectedKey::Pool(k) => k.provider_specific.clone(),
        SelectedKey::Direct(_) => None,
    };
    let settings = state.provider_settings.get(&provider);
    let ctx = UpstreamCtx {
        trace_id: request.header.context.trace_id.clone(),
        user_agent: None,
        outbound_proxy: state.upstream.current_proxy(),
        provider: provider.clone(),
        attempt_no: 0,
    };

    let http_request = match adapter
        .build_request(&ctx, settings, key.value(), provider_specific.as_ref(), &request)
        .await
    {
        Ok(req) => req,
        Err(err) => {
            runtime.circuit_breaker.record(false, started.elapsed());
            return Err(CanonicalError::new(ErrorKind::InvalidRequest, err.to_string()));
        }
    };

    let upstream_response = match state.upstream.send(http_request).await {
        Ok(resp) => resp,
        Err(failure) => {
            runtime.circuit_breaker.record(false, started.elapsed());
            tracing::warn!(provider = %provider, "streaming upstream call failed before headers arrived");
            return Err(transport_failure_to_gateway_error(failure).into_canonical());
        }
    };

    if !(200..300).contains(&upstream_response.status) {
        runtime.circuit_breaker.record(false, started.elapsed());
        let body = match upstream_response.body {
            UpstreamBody::Bytes(b) => b,
            UpstreamBody::Stream(_) => Bytes::new(),
        };
        return Err(http_failure_to_gateway_error(upstream_response.status, &body).into_canonical());
    }

    let upstream_rx = match upstream_response.body {
        UpstreamBody::Stream(rx) => rx,
        UpstreamBody::Bytes(bytes) => {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(bytes);
            rx
        }
    };

    let (out_tx, out_rx) = mpsc::channel::<Bytes>(32);
    let request_id = request.header.context.request_id;
    let accumulators = state.accumulators.clone();
    let breaker = runtime.circuit_breaker.clone();

    tokio::spawn(async move {
        let mut upstream_rx = upstream_rx;
        let mut parser = SseParser::new();
        let mut chunk_index: u64 = 0;
        let mut saw_chunk = false;

        while let Some(bytes) = upstream_rx.recv().await {
            let events = parser.push_bytes(&bytes);
            let forwarded = forward_events(
                events,
                &adapter,
                &ctx,
                &request,
                &accumulators,
                request_id,
                &mut chunk_index,
                &out_tx,
                framing,
            )
            .await;
            saw_chunk = saw_chunk || forwarded;
            if out_tx.is_closed() {
                break;
            }
        }

        let trailing = parser.finish();
        let forwarded = forward_events(
            trailing,
            &adapter,
            &ctx,
            &request,
            &accumulators,
            request_id,
            &mut chunk_index,
            &out_tx,
            framing,
        )
        .await;
        saw_chunk = saw_chunk || forwarded;

        if matches!(framing, DialectFraming::OpenAi) {
            let _ = out_tx.send(encode_openai_done()).await;
        }

        breaker.record(saw_chunk, started.elapsed());
        accumulators.evict(request_id);
    });

    Ok(out_rx)
}

async fn forward_events(
    events: Vec<SseEvent>,
    adapter: &Arc<dyn UpstreamProvider>,
    ctx: &UpstreamCtx,
    request: &Request,
    accumulators: &AccumulatorStore,
    request_id: Uuid,
    chunk_index: &mut u64,
    out_tx: &mpsc::Sender<Bytes>,
    framing: DialectFraming,
) -> bool {
    let mut forwarded_any = false;
    for event in events {
        let event_name = event.event.as_deref().unwrap_or("");
        let Ok(Some(mut chunk)) = adapter.parse_stream_event(ctx, request, event_name, &event.data)
        else {
            continue;
        };
        chunk.request_id = request_id;
        chunk.chunk_index = *chunk_index;
        *chunk_index += 1;
        forwarded_any = true;

        accumulators.ingest(chunk.clone());

        let frame = match framing {
            DialectFraming::OpenAi | DialectFraming::GenAi => {
                encode_data_frame(&serde_json::json!({
                    "delta": chunk.delta,
                    "finish_reason": chunk.finish_reason,
                    "usage": chunk.usage,
                }))
            }
            DialectFraming::Anthropic => {
                let event_type = if chunk.error_details.is_some() {
                    "error"
                } else if chunk.finish_reason.is_some() {
                    "message_delta"
                } else {
                    "content_block_delta"
                };
                encode_named_frame(
                    event_type,
                    &serde_json::json!({
                        "delta": chunk.delta,
                        "finish_reason": chunk.finish_reason,
                        "usage": chunk.usage,
                        "error": chunk.error_details,
                    }),
                )
            }
        };

        if out_tx.send(frame).await.is_err() {
            break;
        }
    }
    forwarded_any
}
