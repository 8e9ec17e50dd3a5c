use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use bytes::Bytes;
use driftgate_schema::OperationKind;

use crate::errors::{canonical_error_response, invalid_route_response};
use crate::large_payload;
use crate::response::{dispatch_json, dispatch_sse};
use crate::routing::{build_request, extract_fallbacks, split_provider_model_action};
use crate::sse::DialectFraming;
use crate::state::{AppState, Dialect};

/// GenAI's `{model}:action` path segment is itself `"provider/model"`, so
/// the route captures it as a wildcard (`{*model_action}`) rather than a
/// single path param, since it contains an embedded `/`.
pub async fn dispatch(
    State(state): State<AppState>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    let Some((provider, model, action)) = split_provider_model_action(&model_action) else {
        return canonical_error_response(driftgate_schema::CanonicalError::new(
            driftgate_schema::ErrorKind::InvalidRequest,
            "path must be of the form \"{provider}/{model}:{action}\"",
        ));
    };

    // Large-payload scanner (spec §4.1): for bodies at or above the
    // configured threshold, pull `generationConfig`'s routing-relevant
    // fields out with the byte scanner instead of trusting them to fall out
    // of the full decode below for free — the scanner is what lets this
    // metadata be recovered without a full parse when the body is large
    // enough that a full parse is the thing being guarded against.
    let scanned = if body.len() as u64 >= state.large_payload.threshold_bytes {
        large_payload::scan(&body, state.large_payload.prefetch_bytes)
    } else {
        None
    };

    let mut value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => {
            return canonical_error_response(driftgate_schema::CanonicalError::new(
                driftgate_schema::ErrorKind::InvalidRequest,
                format!("invalid request body: {err}"),
            ));
        }
    };

    let (kind, is_stream) = match action.as_str() {
        "generateContent" => (OperationKind::ChatCompletion, false),
        "streamGenerateContent" => (OperationKind::ChatCompletion, true),
        "embedContent" => (OperationKind::Embedding, false),
        other => {
            return canonical_error_response(driftgate_schema::CanonicalError::new(
                driftgate_schema::ErrorKind::InvalidRequest,
                format!("unsupported GenAI action: {other}"),
            ));
        }
    };

    // GenAI signals streaming through the path action, not a body field;
    // the aistudio adapter decides its upstream path from `Request::is_streaming`,
    // so the flag is mirrored into the body here to keep that one contract.
    if let Some(obj) = value.as_object_mut() {
        obj.insert("stream".to_string(), serde_json::Value::Bool(is_stream));
    }
    let fallbacks = extract_fallbacks(&mut value);

    let mut request = match build_request(
        &state,
        Dialect::GenAI,
        kind,
        provider.clone(),
        model,
        fallbacks,
        &headers,
        &uri,
        value,
    ) {
        Ok(r) => r,
        Err(err) => return invalid_route_response(err),
    };

    if let Some(meta) = scanned {
        if !meta.response_modalities.is_empty() {
            request
                .header
                .context
                .tags
                .insert("response_modalities".to_string(), meta.response_modalities.join(","));
        }
        if meta.has_speech_config {
            request.header.context.tags.insert("speech_config".to_string(), "true".to_string());
        }
    }

    if is_stream {
        dispatch_sse(&state, provider, request, DialectFraming::GenAi).await
    } else {
        dispatch_json(&state, request).await
    }
}
