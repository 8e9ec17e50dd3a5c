//! The integration router: decodes each dialect's wire request into the
//! canonical `driftgate_schema::Request`, dispatches it through either the
//! pooled `Pipeline` (non-streaming) or the direct streaming bypass, and
//! re-encodes the result back into that dialect's wire shape.

pub mod auth;
pub mod claude;
pub mod errors;
pub mod genai;
pub mod large_payload;
pub mod openai;
pub mod response;
pub mod router;
pub mod routing;
pub mod sse;
pub mod state;
pub mod streaming;

pub use router::build_router;
pub use state::{AppState, Dialect, DialectProviders, LargePayloadConfig, StreamingRuntime};
