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

pub async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
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
        Dialect::Anthropic,
        OperationKind::ChatCompletion,
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
        dispatch_sse(&state, provider, request, DialectFraming::Anthropic).await
    } else {
        dispatch_json(&state, request).await
    }
}
