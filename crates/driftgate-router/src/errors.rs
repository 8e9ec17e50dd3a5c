use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use driftgate_schema::CanonicalError;
use serde_json::{Map, Value, json};

use crate::routing::InvalidRouteRequest;

/// Renders the canonical error envelope (spec §6), the single shape this
/// gateway returns across every dialect regardless of which upstream
/// actually failed.
pub fn canonical_error_response(err: CanonicalError) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope(&err))).into_response()
}

fn envelope(err: &CanonicalError) -> Value {
    let mut extra = Map::new();
    if let Some(provider) = &err.extra_fields.provider {
        extra.insert("provider".to_string(), json!(provider));
    }
    if let Some(model) = &err.extra_fields.model_requested {
        extra.insert("modelRequested".to_string(), json!(model));
    }
    if let Some(request_type) = &err.extra_fields.request_type {
        extra.insert("requestType".to_string(), json!(request_type));
    }

    let mut body = Map::new();
    body.insert("statusCode".to_string(), json!(err.status()));
    if let Some(t) = &err.error_type {
        body.insert("type".to_string(), json!(t));
    }
    if let Some(code) = &err.code {
        body.insert("code".to_string(), json!(code));
    }
    body.insert("message".to_string(), json!(err.message));
    if let Some(param) = &err.param {
        body.insert("param".to_string(), json!(param));
    }
    body.insert("isBifrostError".to_string(), json!(err.is_bifrost_error));
    body.insert("extraFields".to_string(), Value::Object(extra));
    Value::Object(body)
}

pub fn invalid_route_response(err: InvalidRouteRequest) -> Response {
    canonical_error_response(CanonicalError::new(
        driftgate_schema::ErrorKind::InvalidRequest,
        err.0,
    ))
}
