use bytes::Bytes;
use serde_json::Value;

use driftgate_provider_core::{
    HttpMethod, ProviderError, ProviderResult, ProviderSettings, UpstreamCtx, UpstreamHttpRequest,
    UpstreamProvider,
};
use driftgate_schema::{OperationKind, ProviderSpecific, Request, Response, StreamChunk};

use crate::auth_extractor;
use crate::build_url::build_url;

const PROVIDER_NAME: &str = "aistudio";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Default)]
pub struct AIStudioProvider;

impl AIStudioProvider {
    pub fn new() -> Self {
        Self
    }
}

fn base_url(settings: Option<&ProviderSettings>) -> &str {
    match settings {
        Some(ProviderSettings::AIStudio(cfg)) => {
            cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
        }
        _ => DEFAULT_BASE_URL,
    }
}

fn normalize_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for AIStudioProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn build_request(
        &self,
        _ctx: &UpstreamCtx,
        settings: Option<&ProviderSettings>,
        key_value: &str,
        _provider_specific: Option<&ProviderSpecific>,
        request: &Request,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let base = base_url(settings);
        let model = normalize_model_name(&request.header.model);
        let is_stream = request.is_streaming();

        let path = match request.kind {
            OperationKind::ChatCompletion if is_stream => {
                format!("/v1beta/{model}:streamGenerateContent?alt=sse")
            }
            OperationKind::ChatCompletion => format!("/v1beta/{model}:generateContent"),
            OperationKind::Embedding => format!("/v1beta/{model}:embedContent"),
            OperationKind::ListModels => "/v1beta/models".to_string(),
            other => return Err(ProviderError::Unsupported(operation_name(other))),
        };
        let url = build_url(Some(base), DEFAULT_BASE_URL, &path);

        let mut headers = Vec::new();
        auth_extractor::set_header(&mut headers, "x-goog-api-key", key_value);
        auth_extractor::set_accept_json(&mut headers);

        if matches!(request.kind, OperationKind::ListModels) {
            return Ok(UpstreamHttpRequest {
                method: HttpMethod::Get,
                url,
                headers,
                body: None,
                is_stream: false,
            });
        }

        auth_extractor::set_content_type_json(&mut headers);
        let body = serde_json::to_vec(&request.body)
            .map_err(|err| ProviderError::Other(err.to_string()))?;
        Ok(UpstreamHttpRequest {
            method: HttpMethod::Post,
            url,
            headers,
            body: Some(Bytes::from(body)),
            is_stream,
        })
    }

    fn parse_response(
        &self,
        _ctx: &UpstreamCtx,
        request: &Request,
        _status: u16,
        body: &Bytes,
    ) -> ProviderResult<Response> {
        let value: Value =
            serde_json::from_slice(body).map_err(|err| ProviderError::Other(err.to_string()))?;
        let usage = value.get("usageMetadata").cloned();
        Ok(Response {
            kind: request.kind,
            id: String::new(),
            created: 0,
            model: request.header.model.clone(),
            usage,
            raw_response: Some(value.clone()),
            body: value,
            extra_fields: Default::default(),
        })
    }

    fn parse_stream_event(
        &self,
        _ctx: &UpstreamCtx,
        _request: &Request,
        _event: &str,
        data: &str,
    ) -> ProviderResult<Option<StreamChunk>> {
        // `alt=sse` frames the same `GenerateContentResponse` JSON shape per
        // event; translate `candidates[0].content.parts[].text` into the
        // OpenAI-shaped delta the accumulator expects.
        let value: Value =
            serde_json::from_str(data).map_err(|err| ProviderError::Other(err.to_string()))?;
        let candidate = value.get("candidates").and_then(|c| c.get(0));
        let text: String = candidate
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let finish_reason = candidate
            .and_then(|c| c.get("finishReason"))
            .and_then(Value::as_str)
            .map(|s| s.to_ascii_lowercase());
        let usage = value.get("usageMetadata").cloned();
        let delta = if text.is_empty() {
            Value::Null
        } else {
            serde_json::json!({"role": "assistant", "content": text})
        };
        Ok(Some(StreamChunk {
            request_id: uuid::Uuid::nil(),
            chunk_index: 0,
            delta,
            finish_reason,
            usage,
            timestamp_ms: 0,
            error_details: None,
        }))
    }
}

fn operation_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::TextCompletion => "text completion",
        OperationKind::ChatCompletion => "chat completion",
        OperationKind::Embedding => "embedding",
        OperationKind::Speech => "speech",
        OperationKind::Transcription => "transcription",
        OperationKind::Responses => "responses",
        OperationKind::ImageGeneration => "image generation",
        OperationKind::ImageEdit => "image edit",
        OperationKind::ListModels => "list models",
        OperationKind::FileUpload => "file upload",
        OperationKind::BatchLifecycle => "batch lifecycle",
    }
}
