use driftgate_provider_core::{HttpMethod, UpstreamCtx, header_get};
use driftgate_provider_impl::register_builtin_providers;
use driftgate_schema::{ContextMap, ModelParameters, OperationKind, Request, RequestHeader};
use serde_json::json;
use uuid::Uuid;

fn ctx(provider: &str) -> UpstreamCtx {
    UpstreamCtx {
        trace_id: None,
        user_agent: None,
        outbound_proxy: None,
        provider: provider.to_string(),
        attempt_no: 0,
    }
}

fn chat_request(model: &str) -> Request {
    Request {
        kind: OperationKind::ChatCompletion,
        header: RequestHeader {
            provider: "test".to_string(),
            model: model.to_string(),
            fallbacks: Vec::new(),
            params: ModelParameters::default(),
            context: ContextMap::new(Uuid::new_v4()),
        },
        body: json!({"model": model, "messages": [{"role": "user", "content": "hi"}]}),
    }
}

#[tokio::test]
async fn openai_chat_completion_request_shape() {
    let mut reg = driftgate_provider_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("openai").unwrap();

    let req = provider
        .build_request(&ctx("openai"), None, "sk-test", None, &chat_request("gpt-4o"))
        .await
        .unwrap();

    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(req.url, "https://api.openai.com/v1/chat/completions");
    assert_eq!(
        header_get(&req.headers, "Authorization"),
        Some("Bearer sk-test")
    );
    assert!(req.body.is_some());
}

#[tokio::test]
async fn claude_chat_completion_uses_x_api_key() {
    let mut reg = driftgate_provider_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("claude").unwrap();

    let req = provider
        .build_request(
            &ctx("claude"),
            None,
            "sk-ant-test",
            None,
            &chat_request("claude-sonnet-4-5"),
        )
        .await
        .unwrap();

    assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(header_get(&req.headers, "x-api-key"), Some("sk-ant-test"));
    assert_eq!(header_get(&req.headers, "Authorization"), None);
}

#[tokio::test]
async fn aistudio_chat_completion_uses_goog_api_key() {
    let mut reg = driftgate_provider_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("aistudio").unwrap();

    let req = provider
        .build_request(
            &ctx("aistudio"),
            None,
            "goog-test",
            None,
            &chat_request("gemini-2.5-pro"),
        )
        .await
        .unwrap();

    assert_eq!(
        req.url,
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
    );
    assert_eq!(header_get(&req.headers, "x-goog-api-key"), Some("goog-test"));
}

#[tokio::test]
async fn vertex_is_unsupported_in_this_build() {
    let mut reg = driftgate_provider_core::ProviderRegistry::new();
    register_builtin_providers(&mut reg);
    let provider = reg.get("vertex").unwrap();

    let result = provider
        .build_request(&ctx("vertex"), None, "token", None, &chat_request("gemini-2.5-pro"))
        .await;
    assert!(result.is_err());
}
