use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use driftgate_provider_core::{
    ProviderRegistry, ProviderSettings, UpstreamBody, UpstreamCtx, UpstreamFailure,
    UpstreamTransportErrorKind,
};
use driftgate_schema::{NetworkConfig, Request};
use driftgate_schema::Response;

use crate::error::GatewayError;
use crate::key_selector::SelectedKey;
use crate::pipeline::ProviderDispatch;
use crate::upstream_client::UpstreamClient;

/// Wires the provider registry and the shared `UpstreamClient` into the
/// pipeline's dispatch seam — the one concrete `ProviderDispatch` the app
/// wires up, as opposed to the test doubles `pipeline.rs` uses.
///
/// Only used for non-streaming operations; the router's streaming path talks
/// to `UpstreamClient` directly so it can hold the connection open rather
/// than fit through a single `Result<Response, _>` call.
pub struct AdapterDispatch {
    registry: Arc<ProviderRegistry>,
    settings: Arc<HashMap<String, ProviderSettings>>,
    network: Arc<HashMap<String, NetworkConfig>>,
    upstream: Arc<UpstreamClient>,
}

impl AdapterDispatch {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        settings: Arc<HashMap<String, ProviderSettings>>,
        network: Arc<HashMap<String, NetworkConfig>>,
        upstream: Arc<UpstreamClient>,
    ) -> Self {
        Self {
            registry,
            settings,
            network,
            upstream,
        }
    }
}

/// `retry_backoff_initial_ms * 2^attempt`, capped at `retry_backoff_max_ms`
/// (spec §7, `ProviderConfig.network`).
fn backoff_delay(network: &NetworkConfig, attempt: u32) -> std::time::Duration {
    let scaled = network.retry_backoff_initial_ms.saturating_mul(1u64 << attempt.min(16));
    std::time::Duration::from_millis(scaled.min(network.retry_backoff_max_ms))
}

#[async_trait]
impl ProviderDispatch for AdapterDispatch {
    async fn call(
        &self,
        provider: &str,
        request: Request,
        key: SelectedKey,
    ) -> Result<Response, GatewayError> {
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| GatewayError::InvalidRequest(format!("unknown provider: {provider}")))?;

        let provider_specific = match &key {
            SelectedKey::Pool(k) => k.provider_specific.clone(),
            SelectedKey::Direct(_) => None,
        };
        let key_value = key.value().to_string();
        let settings = self.settings.get(provider);
        let network = self.network.get(provider).cloned().unwrap_or_default();

        let mut attempt_no = 0u32;
        loop {
            let ctx = UpstreamCtx {
                trace_id: request.header.context.trace_id.clone(),
                user_agent: None,
                outbound_proxy: self.upstream.current_proxy(),
                provider: provider.to_string(),
                attempt_no,
            };

            let result = self
                .try_once(&*adapter, &ctx, settings, &key_value, provider_specific.as_ref(), &request)
                .await;

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if attempt_no >= network.max_retries || !err.kind().is_retryable_at_provider_level() {
                return Err(err);
            }
            tracing::warn!(
                provider,
                attempt = attempt_no,
                error = %err,
                "retrying upstream call after backoff"
            );
            tokio::time::sleep(backoff_delay(&network, attempt_no)).await;
            attempt_no += 1;
        }
    }
}

impl AdapterDispatch {
    #[allow(clippy::too_many_arguments)]
    async fn try_once(
        &self,
        adapter: &dyn driftgate_provider_core::UpstreamProvider,
        ctx: &UpstreamCtx,
        settings: Option<&ProviderSettings>,
        key_value: &str,
        provider_specific: Option<&driftgate_schema::ProviderSpecific>,
        request: &Request,
    ) -> Result<Response, GatewayError> {
        let http_request = adapter
            .build_request(ctx, settings, key_value, provider_specific, request)
            .await
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;

        if http_request.is_stream {
            return Err(GatewayError::Internal(
                "streaming request reached the non-streaming dispatch path".to_string(),
            ));
        }

        let response = self
            .upstream
            .send(http_request)
            .await
            .map_err(transport_failure_to_gateway_error)?;

        let body = match response.body {
            UpstreamBody::Bytes(bytes) => bytes,
            UpstreamBody::Stream(_) => {
                return Err(GatewayError::Internal(
                    "adapter returned a stream body for a non-streaming request".to_string(),
                ));
            }
        };

        if !(200..300).contains(&response.status) {
            return Err(http_failure_to_gateway_error(response.status, &body));
        }

        adapter
            .parse_response(ctx, request, response.status, &body)
            .map_err(|err| GatewayError::UpstreamServerError(err.to_string()))
    }
}

/// Shared by the router's streaming bypass so both dispatch paths classify
/// transport/HTTP failures identically.
pub fn transport_failure_to_gateway_error(failure: UpstreamFailure) -> GatewayError {
    match failure {
        UpstreamFailure::Transport { kind, message } => match kind {
            UpstreamTransportErrorKind::Timeout | UpstreamTransportErrorKind::ReadTimeout => {
                GatewayError::Timeout
            }
            _ => GatewayError::UpstreamServerError(message),
        },
        UpstreamFailure::Http { status, body, .. } => http_failure_to_gateway_error(status, &body),
    }
}

pub fn http_failure_to_gateway_error(status: u16, body: &Bytes) -> GatewayError {
    let message = String::from_utf8_lossy(body).to_string();
    match status {
        401 | 403 => GatewayError::Unauthorized(message),
        429 => GatewayError::RateLimited,
        500..=599 => GatewayError::UpstreamServerError(message),
        _ => GatewayError::InvalidRequest(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(initial_ms: u64, max_ms: u64, max_retries: u32) -> NetworkConfig {
        NetworkConfig {
            timeout_ms: 30_000,
            max_retries,
            retry_backoff_initial_ms: initial_ms,
            retry_backoff_max_ms: max_ms,
            extra_headers: Vec::new(),
        }
    }

    #[test]
    fn backoff_delay_doubles_each_attempt() {
        let net = network(100, 10_000, 5);
        assert_eq!(backoff_delay(&net, 0), std::time::Duration::from_millis(100));
        assert_eq!(backoff_delay(&net, 1), std::time::Duration::from_millis(200));
        assert_eq!(backoff_delay(&net, 2), std::time::Duration::from_millis(400));
    }

    #[test]
    fn backoff_delay_caps_at_max() {
        let net = network(1000, 3000, 10);
        assert_eq!(backoff_delay(&net, 5), std::time::Duration::from_millis(3000));
    }

    #[test]
    fn backoff_delay_never_overflows_on_large_attempt_numbers() {
        let net = network(1000, 5000, 100);
        assert_eq!(backoff_delay(&net, u32::MAX), std::time::Duration::from_millis(5000));
    }

    #[test]
    fn http_status_classification() {
        assert!(matches!(
            http_failure_to_gateway_error(401, &Bytes::new()),
            GatewayError::Unauthorized(_)
        ));
        assert!(matches!(
            http_failure_to_gateway_error(429, &Bytes::new()),
            GatewayError::RateLimited
        ));
        assert!(matches!(
            http_failure_to_gateway_error(503, &Bytes::new()),
            GatewayError::UpstreamServerError(_)
        ));
        assert!(matches!(
            http_failure_to_gateway_error(400, &Bytes::new()),
            GatewayError::InvalidRequest(_)
        ));
    }

    #[test]
    fn transport_timeout_maps_to_gateway_timeout() {
        let failure = UpstreamFailure::Transport {
            kind: UpstreamTransportErrorKind::Timeout,
            message: "connect timed out".to_string(),
        };
        assert!(matches!(transport_failure_to_gateway_error(failure), GatewayError::Timeout));
    }
}
