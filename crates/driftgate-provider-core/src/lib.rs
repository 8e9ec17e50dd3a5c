//! Core provider abstractions shared by every built-in upstream adapter.
//!
//! This crate intentionally does **not** perform network IO itself or depend
//! on any concrete HTTP client. Provider implementations build
//! `UpstreamHttpRequest` values from the canonical `driftgate_schema::Request`;
//! a higher layer (the router/core pipeline) executes them.

pub mod config;
pub mod credential;
pub mod errors;
pub mod events;
pub mod headers;
pub mod provider;
pub mod registry;

pub use config::{
    AIStudioConfig, AzureConfig, BedrockConfig, ClaudeConfig, CohereConfig, MistralConfig,
    OpenAIConfig, ProviderSettings, VertexConfig,
};
pub use credential::{AcquireError, CredentialId, CredentialPool, CredentialState, UnavailableReason};
pub use errors::{ProviderError, ProviderResult};
pub use events::{
    DownstreamEvent, Event, EventHub, EventSink, ModelUnavailableEndEvent,
    ModelUnavailableStartEvent, OperationalEvent, TerminalEventSink, UnavailableEndEvent,
    UnavailableStartEvent, UpstreamEvent,
};
pub use headers::{Headers, header_get, header_remove, header_set};
pub use provider::{
    HttpMethod, UnavailableDecision, UpstreamBody, UpstreamCtx, UpstreamFailure,
    UpstreamHttpRequest, UpstreamHttpResponse, UpstreamProvider, UpstreamTransportErrorKind,
    default_decide_unavailable,
};
pub use registry::ProviderRegistry;
