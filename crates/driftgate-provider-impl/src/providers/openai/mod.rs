use bytes::Bytes;
use serde_json::Value;

use driftgate_provider_core::{
    HttpMethod, ProviderError, ProviderResult, ProviderSettings, UpstreamCtx, UpstreamHttpRequest,
    UpstreamProvider,
};
use driftgate_schema::{OperationKind, ProviderSpecific, Request, Response, StreamChunk};

use crate::auth_extractor;
use crate::build_url::build_url;

const PROVIDER_NAME: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Default)]
pub struct OpenAIProvider;

impl OpenAIProvider {
    pub fn new() -> Self {
        Self
    }
}

fn base_url(settings: Option<&ProviderSettings>) -> &str {
    match settings {
        Some(ProviderSettings::OpenAI(cfg)) => cfg.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        _ => DEFAULT_BASE_URL,
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for OpenAIProvider {
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
            OperationKind::ChatCompletion => "/v1/chat/completions",
            OperationKind::Responses => "/v1/responses",
            OperationKind::Embedding => "/v1/embeddings",
            OperationKind::Speech => "/v1/audio/speech",
            OperationKind::Transcription => "/v1/audio/transcriptions",
            OperationKind::ImageGeneration => "/v1/images/generations",
            OperationKind::ImageEdit => "/v1/images/edits",
            OperationKind::ListModels => "/v1/models",
            OperationKind::FileUpload => "/v1/files",
            OperationKind::BatchLifecycle => "/v1/batches",
            OperationKind::TextCompletion => "/v1/completions",
        };
        let url = build_url(Some(base), DEFAULT_BASE_URL, path);

        let mut headers = Vec::new();
        auth_extractor::set_bearer(&mut headers, key_value);
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
        let created = value.get("created").and_then(Value::as_i64).unwrap_or(0);
        let model = value
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&request.header.model)
            .to_string();
        let usage = value.get("usage").cloned();
        Ok(Response {
            kind: request.kind,
            id,
            created,
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
        // OpenAI's chat-completions SSE has no `event:` line; the `data:` body is
        // already shaped as `{choices:[{delta:{...}, finish_reason}], usage}`.
        if data.trim() == "[DONE]" {
            return Ok(None);
        }
        if !event.is_empty() && event != "message" {
            return Ok(None);
        }
        let value: Value =
            serde_json::from_str(data).map_err(|err| ProviderError::Other(err.to_string()))?;
        let choice = value.get("choices").and_then(|c| c.get(0));
        let delta = choice
            .and_then(|c| c.get("delta"))
            .cloned()
            .unwrap_or(Value::Null);
        let finish_reason = choice
            .and_then(|c| c.get("finish_reason"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let usage = value.get("usage").cloned();
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
