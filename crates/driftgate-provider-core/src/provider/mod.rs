use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use driftgate_schema::{ProviderSpecific, Request, Response, StreamChunk};

use crate::headers::{Headers, header_get};
use crate::{ProviderResult, ProviderSettings, UnavailableReason};

pub type ByteStream = tokio::sync::mpsc::Receiver<Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        if method.eq_ignore_ascii_case("GET") {
            Some(HttpMethod::Get)
        } else if method.eq_ignore_ascii_case("POST") {
            Some(HttpMethod::Post)
        } else if method.eq_ignore_ascii_case("PUT") {
            Some(HttpMethod::Put)
        } else if method.eq_ignore_ascii_case("PATCH") {
            Some(HttpMethod::Patch)
        } else if method.eq_ignore_ascii_case("DELETE") {
            Some(HttpMethod::Delete)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

#[derive(Debug)]
pub struct UpstreamHttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: UpstreamBody,
}

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

#[derive(Debug, Clone)]
pub struct UpstreamCtx {
    pub trace_id: Option<String>,
    pub user_agent: Option<String>,
    pub outbound_proxy: Option<String>,
    pub provider: String,
    pub attempt_no: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpstreamTransportErrorKind {
    Timeout,
    ReadTimeout,
    Connect,
    Dns,
    Tls,
    Other,
}

#[derive(Debug, Clone)]
pub enum UpstreamFailure {
    /// Transport-level failures (no HTTP response).
    Transport {
        kind: UpstreamTransportErrorKind,
        message: String,
    },
    /// HTTP error response captured as bytes (usually non-2xx).
    Http {
        status: u16,
        headers: Headers,
        body: Bytes,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnavailableDecision {
    pub duration: Duration,
    pub reason: UnavailableReason,
}

const RATE_LIMIT_FALLBACK_SECS: u64 = 30;
const SHORT_COOLDOWN_SECS: u64 = 10;
const AUTH_INVALID_YEARS: u64 = 9_999;

pub fn default_decide_unavailable(failure: &UpstreamFailure) -> Option<UnavailableDecision> {
    match failure {
        UpstreamFailure::Http {
            status, headers, ..
        } => {
            if *status == 404 {
                return None;
            }
            if *status == 429 {
                let duration = parse_retry_after(headers)
                    .unwrap_or_else(|| Duration::from_secs(RATE_LIMIT_FALLBACK_SECS));
                return Some(UnavailableDecision {
                    duration,
                    reason: UnavailableReason::RateLimit,
                });
            }
            if *status == 401 || *status == 403 {
                return Some(UnavailableDecision {
                    duration: auth_invalid_duration(),
                    reason: UnavailableReason::AuthInvalid,
                });
            }
            if (500..600).contains(status) {
                return Some(UnavailableDecision {
                    duration: Duration::from_secs(SHORT_COOLDOWN_SECS),
                    reason: UnavailableReason::Upstream5xx,
                });
            }
            None
        }
        UpstreamFailure::Transport { kind, .. } => match kind {
            UpstreamTransportErrorKind::Timeout
            | UpstreamTransportErrorKind::ReadTimeout
            | UpstreamTransportErrorKind::Connect
            | UpstreamTransportErrorKind::Dns
            | UpstreamTransportErrorKind::Tls => Some(UnavailableDecision {
                duration: Duration::from_secs(SHORT_COOLDOWN_SECS),
                reason: UnavailableReason::Timeout,
            }),
            _ => None,
        },
    }
}

fn parse_retry_after(headers: &Headers) -> Option<Duration> {
    let value = header_get(headers, "retry-after")?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let secs = value.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

fn auth_invalid_duration() -> Duration {
    Duration::from_secs(AUTH_INVALID_YEARS * 365 * 24 * 60 * 60)
}

/// A built-in upstream adapter: translates one canonical `Request` into the
/// wire call for a single provider dialect, and the raw upstream bytes back
/// into a canonical `Response` (or `StreamChunk`s, for streaming operations).
///
/// Adapters receive the selected key already resolved to its secret value
/// and optional provider-specific fields (`driftgate_schema::ProviderSpecific`)
/// rather than a separate credential type — `ProviderKey` is the one place a
/// key's shape is defined, pool-selected or supplied directly (BYOK).
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the upstream HTTP call for a canonical request. Adapters decode
    /// `request.body` by `request.kind` and own their own wire shape; core
    /// never inspects the body itself.
    async fn build_request(
        &self,
        ctx: &UpstreamCtx,
        settings: Option<&ProviderSettings>,
        key_value: &str,
        provider_specific: Option<&ProviderSpecific>,
        request: &Request,
    ) -> ProviderResult<UpstreamHttpRequest>;

    /// Parse a non-streaming upstream response body into the canonical shape.
    fn parse_response(
        &self,
        ctx: &UpstreamCtx,
        request: &Request,
        status: u16,
        body: &Bytes,
    ) -> ProviderResult<Response>;

    /// Parse one upstream SSE frame into a canonical stream chunk. Returns
    /// `Ok(None)` for frames that carry no delta (e.g. a dialect's `[DONE]`
    /// sentinel or a comment line). The returned chunk's `delta` always uses
    /// the OpenAI-shaped fields (`role`/`content`/`refusal`/`tool_calls`) the
    /// accumulator concatenates, regardless of the upstream dialect.
    fn parse_stream_event(
        &self,
        ctx: &UpstreamCtx,
        request: &Request,
        event: &str,
        data: &str,
    ) -> ProviderResult<Option<StreamChunk>>;

    /// Classify an upstream failure into a credential "unavailable" decision.
    fn decide_unavailable(
        &self,
        _ctx: &UpstreamCtx,
        _req: &Request,
        failure: &UpstreamFailure,
    ) -> Option<UnavailableDecision> {
        default_decide_unavailable(failure)
    }
}
