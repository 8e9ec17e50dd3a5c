use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use bytes::Bytes;
use driftgate_schema::OperationKind;

use crate::errors::{canonical_error_response, invalid_route_response};
use crate::response::{dispatch_json, dispatch_sse};
use crate::routing::{build_request, extract_fallbacks, split_provider_model};
use crate::sse::DialectFraming;
use crate::state::{AppState, Dialect};

async fn handle(state: AppState, headers: HeaderMap, uri: Uri, body: Bytes, kind: OperationKind) -> Response {
    let mut value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => {
            return canonical_error_response(driftgate_schema::CanonicalError::new(
                driftgate_schema::ErrorKind::InvalidRequest,
                format!("invalid request body: {err}"),
            ));
        }
    };

    let model_field = value.get("model").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let Some((provider, model)) = split_provider_model(&model_field) else {
        return canonical_error_response(driftgate_schema::CanonicalError::new(
            driftgate_schema::ErrorKind::InvalidRequest,
            "model must be of the form \"provider/model\"",
        ));
    };
    if let Some(obj) = value.as_object_mut() {
        obj.insert("model".to_string(), serde_json::Value::String(model.clone()));
    }
    let fallbacks = extract_fallbacks(&mut value);

    let request = match build_request(
        &state,
        Dialect::OpenAI,
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

    if request.is_streaming() {
        dispatch_sse(&state, provider, request, DialectFraming::OpenAi).await
    } else {
        dispatch_json(&state, request).await
    }
}

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    handle(state, headers, uri, body, OperationKind::ChatCompletion).await
}

pub async fn embeddings(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    handle(state, headers, uri, body, OperationKind::Embedding).await
}
