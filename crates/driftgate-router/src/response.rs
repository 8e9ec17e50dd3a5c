use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use driftgate_schema::Request;
use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::errors::canonical_error_response;
use crate::sse::{DialectFraming, wrap_with_heartbeat};
use crate::state::AppState;
use crate::streaming::dispatch_streaming;

/// Runs a request through the pipeline and renders its outcome as the
/// dialect-agnostic JSON envelope (spec §6): the adapter's canonical
/// response body on success, the canonical error envelope otherwise.
pub async fn dispatch_json(state: &AppState, request: Request) -> Response {
    let outcome = state.pipeline.run(request).await;
    if let Some(response) = outcome.response {
        return Json(response.body).into_response();
    }
    let error = outcome.error.unwrap_or_else(|| {
        driftgate_schema::CanonicalError::new(driftgate_schema::ErrorKind::Internal, "no response")
    });
    canonical_error_response(error)
}

/// Runs a streaming request through the direct bypass and serves the
/// re-framed SSE bytes as the response body, heartbeat-wrapped so the
/// connection never looks idle to an intermediate proxy.
pub async fn dispatch_sse(state: &AppState, provider: String, request: Request, framing: DialectFraming) -> Response {
    match dispatch_streaming(state, provider, request, framing).await {
        Ok(rx) => {
            let rx = wrap_with_heartbeat(rx);
            let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::CONNECTION, "keep-alive")
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| {
                    (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response()
                })
        }
        Err(err) => canonical_error_response(err),
    }
}
