use bytes::Bytes;
use serde_json::Value;

use driftgate_provider_core::{
    HttpMethod, ProviderError, ProviderResult, ProviderSettings, UpstreamCtx, UpstreamHttpRequest,
    UpstreamProvider,
};
use driftgate_schema::{OperationKind, ProviderSpecific, Request, Response, StreamChunk};

use crate::auth_extractor;

const PROVIDER_NAME: &str = "azure";
const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI speaks the OpenAI wire format but routes by deployment name
/// rather than model, and carries the key in `api-key` rather than
/// `Authorization: Bearer`.
#[derive(Debug, Default)]
pub struct AzureProvider;

impl AzureProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for AzureProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn build_request(
        &self,
        _ctx: &UpstreamCtx,
        settings: Option<&ProviderSettings>,
        key_value: &str,
        provider_specific: Option<&ProviderSpecific>,
        request: &Request,
    ) -> ProviderResult<UpstreamHttpRequest> {
        let ProviderSpecific::Azure {
            endpoint,
            deployments,
            api_version,
        } = provider_specific.ok_or(ProviderError::MissingCredentialField("azure"))?
        else {
            return Err(ProviderError::InvalidConfig(
                "expected ProviderSpecific::Azure".to_string(),
            ));
        };

        let api_version = if api_version.is_empty() {
            settings
                .and_then(|s| match s {
                    ProviderSettings::Azure(cfg) => cfg.api_version.as_deref(),
                    _ => None,
                })
                .unwrap_or(DEFAULT_API_VERSION)
        } else {
            api_version.as_str()
        };

        let deployment = deployments
            .get(&request.header.model)
            .map(String::as_str)
            .unwrap_or(&request.header.model);

        let op = match request.kind {
            OperationKind::ChatCompletion => "chat/completions",
            OperationKind::Embedding => "embeddings",
            other => return Err(ProviderError::Unsupported(operation_name(other))),
        };

        let base = endpoint.trim_end_matches('/');
        let url = format!(
            "{base}/openai/deployments/{deployment}/{op}?api-version={api_version}"
        );

        let mut headers = Vec::new();
        auth_extractor::set_header(&mut headers, "api-key", key_value);
        auth_extractor::set_accept_json(&mut headers);
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
        let usage = value.get("usage").cloned();
        Ok(Response {
            kind: request.kind,
            id,
            created,
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
        event: &str,
        data: &str,
    ) -> ProviderResult<Option<StreamChunk>> {
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
