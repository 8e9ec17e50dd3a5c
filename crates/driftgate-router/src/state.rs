use std::collections::HashMap;
use std::sync::Arc;

use driftgate_core::{AccumulatorStore, CircuitBreaker, Pipeline, UpstreamClient};
use driftgate_provider_core::{ProviderRegistry, ProviderSettings};
use driftgate_schema::ProviderKey;

/// Per-provider state the streaming bypass needs to run its own key
/// selection and circuit-breaker bookkeeping, since it never goes through
/// `Pipeline::run`. `circuit_breaker` is the *same* `Arc` the pipeline's own
/// `ProviderRuntime` holds for this provider — wired up once in `main`, so a
/// provider's failure history stays consistent whether a request took the
/// pooled or the streaming path.
#[derive(Clone)]
pub struct StreamingRuntime {
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub keys: Vec<ProviderKey>,
}

/// Which provider names a dialect's aggregate routes may dispatch to (spec
/// §6): `/openai/...` only reaches OpenAI-shaped providers, `/anthropic/...`
/// only Claude, `/genai/...` only AI Studio. Cross-dialect fan-out (e.g.
/// reaching Vertex from a `/genai/...` path) is out of scope for the literal
/// route table this gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    OpenAI,
    Anthropic,
    GenAI,
}

#[derive(Clone, Default)]
pub struct DialectProviders {
    pub openai: Vec<String>,
    pub anthropic: Vec<String>,
    pub genai: Vec<String>,
}

impl DialectProviders {
    pub fn allows(&self, dialect: Dialect, provider: &str) -> bool {
        let list = match dialect {
            Dialect::OpenAI => &self.openai,
            Dialect::Anthropic => &self.anthropic,
            Dialect::GenAI => &self.genai,
        };
        list.iter().any(|p| p == provider)
    }
}

/// Thresholds for the GenAI large-payload metadata scanner (spec §4.1):
/// bodies at or above `threshold_bytes` are scanned via
/// `large_payload::scan` instead of being trusted to a plain top-level
/// field lookup; `prefetch_bytes` bounds the cheap first pass over the
/// start of the buffer before falling back to a full-buffer scan.
#[derive(Clone, Copy)]
pub struct LargePayloadConfig {
    pub threshold_bytes: u64,
    pub prefetch_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub registry: Arc<ProviderRegistry>,
    pub provider_settings: Arc<HashMap<String, ProviderSettings>>,
    pub upstream: Arc<UpstreamClient>,
    pub streaming: Arc<HashMap<String, StreamingRuntime>>,
    pub accumulators: Arc<AccumulatorStore>,
    pub dialect_providers: Arc<DialectProviders>,
    pub large_payload: LargePayloadConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_only_allows_its_own_providers() {
        let providers = DialectProviders {
            openai: vec!["openai".to_string(), "azure".to_string()],
            anthropic: vec!["claude".to_string()],
            genai: vec!["aistudio".to_string()],
        };
        assert!(providers.allows(Dialect::OpenAI, "azure"));
        assert!(!providers.allows(Dialect::OpenAI, "claude"));
        assert!(providers.allows(Dialect::Anthropic, "claude"));
        assert!(!providers.allows(Dialect::GenAI, "azure"));
    }

    #[test]
    fn unconfigured_dialect_allows_nothing() {
        let providers = DialectProviders::default();
        assert!(!providers.allows(Dialect::OpenAI, "openai"));
    }
}
