use axum::Router;
use axum::routing::post;

use crate::state::AppState;
use crate::{claude, genai, openai};

/// Assembles the gateway's HTTP surface. Every route here is an aggregate
/// (no-provider-prefix) route per spec §6 — the provider is encoded in the
/// request's `model` field (or, for GenAI, its path segment) rather than a
/// path prefix, and each dialect family only ever reaches the providers
/// that speak its wire shape (`AppState::dialect_providers`).
///
/// Deliberately out of scope for this build (documented in DESIGN.md):
/// `/openai/v1/audio/speech`, `/openai/v1/audio/transcriptions`, and GenAI's
/// file-upload and batch-lifecycle routes. Each needs substantially more
/// machinery (multipart audio, two-phase upload sessions, polling job
/// state) than the chat/messages/generateContent core this gateway focuses
/// on.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/openai/v1/chat/completions", post(openai::chat_completions))
        .route("/openai/v1/embeddings", post(openai::embeddings))
        .route("/anthropic/v1/messages", post(claude::messages))
        .route("/genai/v1beta/models/{*model_action}", post(genai::dispatch))
        .with_state(state)
}
