pub mod accumulator;
pub mod circuit_breaker;
pub mod dispatch;
pub mod error;
pub mod key_selector;
pub mod pipeline;
pub mod plugin;
pub mod upstream_client;
pub mod worker_pool;

pub use accumulator::{AccumulatorStore, AssembledResponse};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, WindowKind};
pub use dispatch::{AdapterDispatch, http_failure_to_gateway_error, transport_failure_to_gateway_error};
pub use error::GatewayError;
pub use key_selector::{KeySelector, SelectedKey};
pub use pipeline::{Pipeline, PipelineOutcome, ProviderDispatch, ProviderRuntime};
pub use plugin::{Plugin, PluginChain, PostHookResult, PreHookResult, ShortCircuit};
pub use upstream_client::{UpstreamClient, UpstreamClientConfig};
pub use worker_pool::{WorkItem, WorkerPool, WorkerPoolConfig};
