use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The canonical error taxonomy (spec §7), with the HTTP status each kind
/// maps to at the dialect boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("invalid request")]
    InvalidRequest,
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("upstream server error")]
    UpstreamServerError,
    #[error("timeout")]
    Timeout,
    #[error("no valid key")]
    NoValidKey,
    #[error("circuit open")]
    CircuitOpen,
    #[error("queue full")]
    QueueFull,
    #[error("plugin short-circuit")]
    PluginShortCircuit,
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Default HTTP status for this kind when the upstream didn't supply one.
    pub fn default_status(self) -> u16 {
        match self {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::RateLimited => 429,
            ErrorKind::UpstreamServerError => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::NoValidKey => 503,
            ErrorKind::CircuitOpen => 503,
            ErrorKind::QueueFull => 429,
            ErrorKind::PluginShortCircuit => 200,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether the circuit breaker counts this outcome as a failure
    /// (spec §4.4: "Failure includes any adapter error and any upstream
    /// status ≥ 500 and 429; 4xx other than 429 count as successes").
    pub fn counts_as_circuit_failure(self) -> bool {
        !matches!(
            self,
            ErrorKind::InvalidRequest | ErrorKind::Unauthorized | ErrorKind::PluginShortCircuit
        )
    }

    /// Whether this error is retryable-at-provider-level, i.e. eligible for
    /// fallback re-dispatch per spec §4.3/§7.
    pub fn is_retryable_at_provider_level(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::UpstreamServerError
                | ErrorKind::Timeout
                | ErrorKind::CircuitOpen
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorExtraFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_requested: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
}

/// The canonical error envelope (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct CanonicalError {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default)]
    pub is_bifrost_error: bool,
    #[serde(default)]
    pub extra_fields: ErrorExtraFields,
}

impl CanonicalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code: None,
            error_type: None,
            code: None,
            message: message.into(),
            param: None,
            is_bifrost_error: true,
            extra_fields: ErrorExtraFields::default(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or_else(|| self.kind.default_status())
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_counts_as_failure_and_is_retryable() {
        assert!(ErrorKind::RateLimited.counts_as_circuit_failure());
        assert!(ErrorKind::RateLimited.is_retryable_at_provider_level());
    }

    #[test]
    fn client_error_other_than_429_does_not_count_as_failure() {
        assert!(!ErrorKind::InvalidRequest.counts_as_circuit_failure());
    }

    #[test]
    fn default_status_falls_back_when_unset() {
        let err = CanonicalError::new(ErrorKind::Timeout, "deadline exceeded");
        assert_eq!(err.status(), 504);
    }
}
