use driftgate_schema::{ContextMap, FallbackTarget, ModelParameters, OperationKind, Request, RequestHeader};
use uuid::Uuid;

use crate::auth::extract_user_key;
use crate::state::{AppState, Dialect};
use axum::http::{HeaderMap, Uri};

/// Splits `"provider/actual-model"` into its two halves, tolerating a
/// `models/` prefix (GenAI's native model naming convention). Mirrors the
/// aggregate-route convention this gateway's literal endpoints use: the
/// provider is never a path segment, it's encoded into the model name.
pub fn split_provider_model(input: &str) -> Option<(String, String)> {
    let raw = input.trim().trim_start_matches('/');
    let raw = raw.strip_prefix("models/").unwrap_or(raw);
    let (provider, model) = raw.split_once('/')?;
    let provider = provider.trim();
    let model = model.trim();
    if provider.is_empty() || model.is_empty() {
        return None;
    }
    Some((provider.to_string(), model.to_string()))
}

/// Splits GenAI's `{model}:action` path segment (itself `"provider/model"`)
/// into provider, model, and action.
pub fn split_provider_model_action(input: &str) -> Option<(String, String, String)> {
    let raw = input.trim().trim_start_matches('/');
    let (model, action) = raw.split_once(':')?;
    let (provider, model) = split_provider_model(model)?;
    let action = action.trim();
    if action.is_empty() {
        return None;
    }
    Some((provider, model, action.to_string()))
}

pub struct InvalidRouteRequest(pub String);

/// Extracts the dialect object's `fallbacks` field (spec §4.1 step 4):
/// accepts a single `"provider/model"` string or a list of either such
/// strings or `{provider, model}` objects. Removes the field from `value`
/// so it isn't also forwarded upstream as part of the provider-specific
/// body. Malformed entries are dropped rather than rejecting the request.
pub fn extract_fallbacks(value: &mut serde_json::Value) -> Vec<FallbackTarget> {
    let Some(obj) = value.as_object_mut() else {
        return Vec::new();
    };
    let Some(raw) = obj.remove("fallbacks") else {
        return Vec::new();
    };
    parse_fallbacks(&raw)
}

fn parse_fallbacks(raw: &serde_json::Value) -> Vec<FallbackTarget> {
    match raw {
        serde_json::Value::String(s) => fallback_from_str(s).into_iter().collect(),
        serde_json::Value::Array(items) => items.iter().filter_map(fallback_from_value).collect(),
        _ => Vec::new(),
    }
}

fn fallback_from_value(item: &serde_json::Value) -> Option<FallbackTarget> {
    match item {
        serde_json::Value::String(s) => fallback_from_str(s),
        serde_json::Value::Object(_) => {
            let provider = item.get("provider")?.as_str()?.to_string();
            let model = item.get("model")?.as_str()?.to_string();
            Some(FallbackTarget { provider, model })
        }
        _ => None,
    }
}

fn fallback_from_str(s: &str) -> Option<FallbackTarget> {
    split_provider_model(s).map(|(provider, model)| FallbackTarget { provider, model })
}

/// Builds the canonical `Request` a handler needs to dispatch, threading
/// the downstream caller's own key (BYOK), `x-bf-prom-*` tags, and any
/// dialect-object `fallbacks` into its header, and rejecting providers not
/// reachable from `dialect`.
#[allow(clippy::too_many_arguments)]
pub fn build_request(
    state: &AppState,
    dialect: Dialect,
    kind: OperationKind,
    provider: String,
    model: String,
    fallbacks: Vec<FallbackTarget>,
    headers: &HeaderMap,
    uri: &Uri,
    body: serde_json::Value,
) -> Result<Request, InvalidRouteRequest> {
    if !state.dialect_providers.allows(dialect, &provider) {
        return Err(InvalidRouteRequest(format!(
            "provider '{provider}' is not reachable from this dialect's routes"
        )));
    }

    let mut context = ContextMap::new(Uuid::new_v4());
    context.tags = crate::auth::prom_tags_from_headers(headers);
    if let Some((key, _source)) = extract_user_key(headers, uri.query()) {
        context.direct_key = Some(key);
    }

    Ok(Request {
        kind,
        header: RequestHeader {
            provider,
            model,
            fallbacks,
            params: ModelParameters::default(),
            context,
        },
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_provider_model_happy_path() {
        let (provider, model) = split_provider_model("openai/gpt-4o").unwrap();
        assert_eq!(provider, "openai");
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn split_provider_model_strips_models_prefix() {
        let (provider, model) = split_provider_model("models/aistudio/gemini-1.5-pro").unwrap();
        assert_eq!(provider, "aistudio");
        assert_eq!(model, "gemini-1.5-pro");
    }

    #[test]
    fn split_provider_model_rejects_missing_slash() {
        assert!(split_provider_model("gpt-4o").is_none());
    }

    #[test]
    fn split_provider_model_rejects_empty_halves() {
        assert!(split_provider_model("/gpt-4o").is_none());
        assert!(split_provider_model("openai/").is_none());
    }

    #[test]
    fn split_provider_model_tolerates_nested_model_slashes() {
        let (provider, model) = split_provider_model("vertex/publishers/google/models/gemini-1.5-pro").unwrap();
        assert_eq!(provider, "vertex");
        assert_eq!(model, "publishers/google/models/gemini-1.5-pro");
    }

    #[test]
    fn split_provider_model_action_happy_path() {
        let (provider, model, action) =
            split_provider_model_action("aistudio/gemini-1.5-pro:streamGenerateContent").unwrap();
        assert_eq!(provider, "aistudio");
        assert_eq!(model, "gemini-1.5-pro");
        assert_eq!(action, "streamGenerateContent");
    }

    #[test]
    fn split_provider_model_action_rejects_missing_action() {
        assert!(split_provider_model_action("aistudio/gemini-1.5-pro").is_none());
    }

    #[test]
    fn split_provider_model_action_rejects_empty_action() {
        assert!(split_provider_model_action("aistudio/gemini-1.5-pro:").is_none());
    }

    #[test]
    fn extract_fallbacks_accepts_single_string() {
        let mut value = serde_json::json!({"model": "x", "fallbacks": "openai/gpt-4o"});
        let fallbacks = extract_fallbacks(&mut value);
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].provider, "openai");
        assert_eq!(fallbacks[0].model, "gpt-4o");
        assert!(value.get("fallbacks").is_none());
    }

    #[test]
    fn extract_fallbacks_accepts_list_of_strings() {
        let mut value = serde_json::json!({"fallbacks": ["openai/gpt-4o", "claude/claude-3"]});
        let fallbacks = extract_fallbacks(&mut value);
        assert_eq!(fallbacks.len(), 2);
        assert_eq!(fallbacks[1].provider, "claude");
    }

    #[test]
    fn extract_fallbacks_accepts_list_of_objects() {
        let mut value = serde_json::json!({"fallbacks": [{"provider": "openai", "model": "gpt-4o"}]});
        let fallbacks = extract_fallbacks(&mut value);
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].provider, "openai");
        assert_eq!(fallbacks[0].model, "gpt-4o");
    }

    #[test]
    fn extract_fallbacks_drops_malformed_entries() {
        let mut value = serde_json::json!({"fallbacks": ["not-a-provider-model", {"provider": "openai"}]});
        assert!(extract_fallbacks(&mut value).is_empty());
    }

    #[test]
    fn extract_fallbacks_absent_field_returns_empty() {
        let mut value = serde_json::json!({"model": "x"});
        assert!(extract_fallbacks(&mut value).is_empty());
    }
}
