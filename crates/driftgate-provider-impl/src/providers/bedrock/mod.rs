use bytes::Bytes;

use driftgate_provider_core::{
    ProviderError, ProviderResult, ProviderSettings, UpstreamCtx, UpstreamHttpRequest,
    UpstreamProvider,
};
use driftgate_schema::{ProviderSpecific, Request, Response, StreamChunk};

/// Bedrock is represented in the schema and key pool (`ProviderSpecific::Bedrock`,
/// access/secret/session credentials) but is data-model-only in this build: SigV4
/// request signing is not implemented, so every request is refused rather than
/// half-supported.
#[derive(Debug, Default)]
pub struct BedrockProvider;

impl BedrockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl UpstreamProvider for BedrockProvider {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    async fn build_request(
        &self,
        _ctx: &UpstreamCtx,
        _settings: Option<&ProviderSettings>,
        _key_value: &str,
        _provider_specific: Option<&ProviderSpecific>,
        _request: &Request,
    ) -> ProviderResult<UpstreamHttpRequest> {
        Err(ProviderError::Unsupported(
            "bedrock dispatch is not implemented in this build",
        ))
    }

    fn parse_response(
        &self,
        _ctx: &UpstreamCtx,
        _request: &Request,
        _status: u16,
        _body: &Bytes,
    ) -> ProviderResult<Response> {
        Err(ProviderError::Unsupported(
            "bedrock dispatch is not implemented in this build",
        ))
    }

    fn parse_stream_event(
        &self,
        _ctx: &UpstreamCtx,
        _request: &Request,
        _event: &str,
        _data: &str,
    ) -> ProviderResult<Option<StreamChunk>> {
        Err(ProviderError::Unsupported(
            "bedrock dispatch is not implemented in this build",
        ))
    }
}
