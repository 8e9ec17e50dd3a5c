use bytes::Bytes;
use serde_json::Value;

use driftgate_provider_core::{
    HttpMethod, ProviderError, ProviderResult, ProviderSettings, UpstreamCtx, UpstreamHttpRequest,
    UpstreamProvider,
};
use driftgate_schema::{OperationKind, ProviderSpecific, Request, Response, StreamChunk};

use crate::auth_extractor;
use crate::build_url::build_url;

const PROVIDER_NAME: &str = "claude";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Default)]
pub struct ClaudeProvider;

impl ClaudeProvider {
    pub fn new() -> Self {
        Self
    }
}

fn base_url(settings: Option<&ProviderSettings>) -> &str {
    match settings {
        Some(ProviderSettings::Claude(cfg)) => cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        _ => DEFAULT_BASE_URL,
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for ClaudeProvider {
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

        let path = match request.kind {
            OperationKind::ChatCompletion => "/v1/messages",
            OperationKind::ListModels => "/v1/models",
            other => {
                return Err(ProviderError::Unsupported(operation_name(other)));
            }
        };
        let url = build_url(Some(base), DEFAULT_BASE_URL, path);

        let mut headers = Vec::new();
        auth_extractor::set_header(&mut headers, "x-api-key", key_value);
        auth_extractor::set_header(&mut headers, "anthropic-version", ANTHROPIC_VERSION);
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
            is_stream: request.is_streaming(),
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
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let model = value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&request.header.model)
            .to_string();
        let usage = value.get("usage").cloned();
        Ok(Response {
            kind: request.kind,
            id,
            created: 0,
            model,
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
        event: &str,
        data: &str,
    ) -> ProviderResult<Option<StreamChunk>> {
        // Anthropic's message stream is a sequence of named SSE events
        // (message_start, content_block_delta, message_delta, message_stop, ...);
        // translate each into the OpenAI-shaped delta the accumulator expects.
        let value: Value =
            serde_json::from_str(data).map_err(|err| ProviderError::Other(err.to_string()))?;

        match event {
            "message_start" => {
                let role = value
                    .get("message")
                    .and_then(|m| m.get("role"))
                    .and_then(Value::as_str)
                    .unwrap_or("assistant");
                Ok(Some(stream_chunk(
                    serde_json::json!({"role": role}),
                    None,
                    None,
                )))
            }
            "content_block_delta" => {
                let delta = value.get("delta").cloned().unwrap_or(Value::Null);
                let text = delta.get("text").and_then(Value::as_str);
                let partial_json = delta.get("partial_json").and_then(Value::as_str);
                let out = if let Some(text) = text {
                    serde_json::json!({"content": text})
                } else if let Some(json) = partial_json {
                    serde_json::json!({"tool_calls": [{"id": "", "function": {"arguments": json}}]})
                } else {
                    return Ok(None);
                };
                Ok(Some(stream_chunk(out, None, None)))
            }
            "message_delta" => {
                let finish_reason = value
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let usage = value.get("usage").cloned();
                Ok(Some(stream_chunk(Value::Null, finish_reason, usage)))
            }
            "message_stop" => Ok(Some(stream_chunk(
                Value::Null,
                Some("stop".to_string()),
                None,
            ))),
            "error" => Ok(Some(StreamChunk {
                request_id: uuid::Uuid::nil(),
                chunk_index: 0,
                delta: Value::Null,
                finish_reason: None,
                usage: None,
                timestamp_ms: 0,
                error_details: Some(value),
            })),
            _ => Ok(None),
        }
    }
}

fn stream_chunk(delta: Value, finish_reason: Option<String>, usage: Option<Value>) -> StreamChunk {
    StreamChunk {
        request_id: uuid::Uuid::nil(),
        chunk_index: 0,
        delta,
        finish_reason,
        usage,
        timestamp_ms: 0,
        error_details: None,
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
