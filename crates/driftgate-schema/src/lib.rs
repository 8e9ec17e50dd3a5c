//! Canonical request/response/error types shared by every component of the
//! gateway, keyed by operation kind rather than by provider dialect.
//!
//! Dialect-specific wire shapes live in `driftgate-protocol` and are mapped
//! into these types at the router edge.

mod context;
mod error;
mod key;
mod params;
mod request;
mod response;
mod stream;

pub use context::ContextMap;
pub use error::{CanonicalError, ErrorExtraFields, ErrorKind};
pub use key::{ProviderKey, ProviderSpecific};
pub use params::ModelParameters;
pub use request::{FallbackTarget, OperationKind, Request, RequestHeader};
pub use response::{Response, ResponseExtraFields};
pub use stream::StreamChunk;

use serde::{Deserialize, Serialize};

/// A provider's configured key pool plus its network and concurrency policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub keys: Vec<ProviderKey>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub buffer_size: Option<usize>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub send_back_raw_response: bool,
}

impl ProviderConfig {
    /// `bufferSize` defaults to `concurrency` when unset, per spec §3.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(self.concurrency).max(self.concurrency)
    }
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_initial_ms")]
    pub retry_backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: 0,
            retry_backoff_initial_ms: default_backoff_initial_ms(),
            retry_backoff_max_ms: default_backoff_max_ms(),
            extra_headers: Vec::new(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_backoff_initial_ms() -> u64 {
    200
}
fn default_backoff_max_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}
