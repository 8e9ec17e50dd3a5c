//! Typed wire structs for the dialects driftgate exposes at its HTTP edge
//! (OpenAI, Anthropic/Claude, Google GenAI/Gemini). These are request/response
//! bodies straight off the wire, not the canonical schema `driftgate-schema`
//! defines — the router decodes into these only where it needs typed field
//! access (model name extraction, streaming detection); provider adapters
//! deal in opaque JSON and never depend on this crate.

pub mod claude;
pub mod gemini;
pub mod openai;
pub mod sse;
