//! Built-in upstream provider implementations.
//!
//! This crate does not perform network IO itself. It builds `UpstreamHttpRequest`
//! values for the router to execute against the shared upstream client.

mod auth_extractor;
mod build_url;
mod providers;

pub use providers::{BuiltinProviderSeed, builtin_provider_seeds, register_builtin_providers};
