use driftgate_schema::{CanonicalError, ErrorKind};
use thiserror::Error;

/// Internal error type for the core pipeline. Every variant maps onto a
/// canonical `ErrorKind` (spec §7) when it crosses the router boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited")]
    RateLimited,
    #[error("upstream server error: {0}")]
    UpstreamServerError(String),
    #[error("timeout")]
    Timeout,
    #[error("no valid key for provider")]
    NoValidKey,
    #[error("circuit open")]
    CircuitOpen,
    #[error("queue full")]
    QueueFull,
    #[error("plugin short-circuit")]
    PluginShortCircuit,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GatewayError::Unauthorized(_) => ErrorKind::Unauthorized,
            GatewayError::RateLimited => ErrorKind::RateLimited,
            GatewayError::UpstreamServerError(_) => ErrorKind::UpstreamServerError,
            GatewayError::Timeout => ErrorKind::Timeout,
            GatewayError::NoValidKey => ErrorKind::NoValidKey,
            GatewayError::CircuitOpen => ErrorKind::CircuitOpen,
            GatewayError::QueueFull => ErrorKind::QueueFull,
            GatewayError::PluginShortCircuit => ErrorKind::PluginShortCircuit,
            GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn into_canonical(self) -> CanonicalError {
        let kind = self.kind();
        CanonicalError::new(kind, self.to_string())
    }
}
