use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use driftgate_schema::{CanonicalError, ErrorKind, ProviderKey, Request, Response};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::GatewayError;
use crate::key_selector::{KeySelector, SelectedKey};
use crate::plugin::{PipelinePreOutcome, Plugin, PluginChain, PostHookOutcome, PreHookResult, ShortCircuit};
use crate::worker_pool::WorkerPool;

/// What the integration router actually calls to reach a provider. Concrete
/// implementations live in `driftgate-provider-impl`; this trait keeps
/// `driftgate-core` decoupled from any specific wire adapter.
#[async_trait]
pub trait ProviderDispatch: Send + Sync {
    async fn call(
        &self,
        provider: &str,
        request: Request,
        key: SelectedKey,
    ) -> Result<Response, GatewayError>;
}

pub struct PipelineOutcome {
    pub response: Option<Response>,
    pub error: Option<CanonicalError>,
}

/// Per-provider runtime state the pipeline needs: its circuit breaker, its
/// worker pool, and its current key list snapshot.
pub struct ProviderRuntime {
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub worker_pool: Arc<WorkerPool<Result<Response, GatewayError>>>,
    pub keys: Vec<ProviderKey>,
}

/// Orchestrates plugin chain → key selection → worker pool → circuit breaker
/// → provider adapter → plugin chain, including fallback re-dispatch, per
/// spec §2's data-flow description.
pub struct Pipeline {
    plugins: PluginChain,
    dispatch: Arc<dyn ProviderDispatch>,
    providers: HashMap<String, ProviderRuntime>,
}

impl Pipeline {
    pub fn new(
        plugins: PluginChain,
        dispatch: Arc<dyn ProviderDispatch>,
        providers: HashMap<String, ProviderRuntime>,
    ) -> Self {
        Self {
            plugins,
            dispatch,
            providers,
        }
    }

    pub async fn run(&self, request: Request) -> PipelineOutcome {
        let pre_outcome = self.plugins.run_pre(request).await;
        let (request, completed) = match pre_outcome {
            // `allow_fallbacks=true` means the request may still be attempted
            // against its configured fallbacks before the short-circuited
            // outcome is returned (spec §4.6); the primary target is never
            // retried here since the short circuit itself is what kept it
            // from being dispatched.
            PipelinePreOutcome::ShortCircuited {
                outcome,
                allow_fallbacks,
                request,
            } => {
                if allow_fallbacks && !request.header.fallbacks.is_empty() {
                    if let Some(response) = self.try_fallback_targets(&request).await {
                        return PipelineOutcome {
                            response: Some(response),
                            error: None,
                        };
                    }
                }
                return PipelineOutcome {
                    response: outcome.response,
                    error: outcome.error,
                };
            }
            PipelinePreOutcome::Continue { request, completed } => (request, completed),
        };

        let deadline = request.header.context.deadline();
        let mut targets = Vec::new();
        targets.push((request.header.provider.clone(), request.header.model.clone()));
        for fallback in &request.header.fallbacks {
            targets.push((fallback.provider.clone(), fallback.model.clone()));
        }

        let mut last_error: Option<CanonicalError> = None;
        for (attempt_idx, (provider, model)) in targets.into_iter().enumerate() {
            let mut attempt_request = request.clone();
            attempt_request.header.provider = provider.clone();
            attempt_request.header.model = model.clone();

            match self
                .dispatch_once(&provider, &model, attempt_request, deadline)
                .await
            {
                Ok(response) => {
                    let outcome = self
                        .plugins
                        .run_post(
                            &completed,
                            PostHookOutcome {
                                response: Some(response),
                                error: None,
                            },
                        )
                        .await;
                    return PipelineOutcome {
                        response: outcome.response,
                        error: outcome.error,
                    };
                }
                Err(err) => {
                    let canonical = err.into_canonical();
                    let retryable = canonical.kind.is_retryable_at_provider_level();
                    last_error = Some(canonical);
                    // Only continue to a fallback target if one exists and
                    // the failure is retryable-at-provider-level (spec §4.3,
                    // §7). `attempt_idx` here is zero-based across the whole
                    // target list, including the primary attempt.
                    if !retryable {
                        break;
                    }
                    let _ = attempt_idx;
                }
            }
        }

        let outcome = self
            .plugins
            .run_post(
                &completed,
                PostHookOutcome {
                    response: None,
                    error: last_error.or_else(|| {
                        Some(CanonicalError::new(ErrorKind::Internal, "no dispatch attempted"))
                    }),
                },
            )
            .await;
        PipelineOutcome {
            response: outcome.response,
            error: outcome.error,
        }
    }

    /// Tries `request.header.fallbacks` in order, returning the first
    /// successful response. Used only for the short-circuit + allow_fallbacks
    /// path (spec §4.6); the normal dispatch path's fallback loop lives in
    /// `run` directly since it also needs to track the primary attempt.
    async fn try_fallback_targets(&self, request: &Request) -> Option<Response> {
        let deadline = request.header.context.deadline();
        for fallback in &request.header.fallbacks {
            let mut attempt_request = request.clone();
            attempt_request.header.provider = fallback.provider.clone();
            attempt_request.header.model = fallback.model.clone();
            if let Ok(response) = self
                .dispatch_once(&fallback.provider, &fallback.model, attempt_request, deadline)
                .await
            {
                return Some(response);
            }
        }
        None
    }

    async fn dispatch_once(
        &self,
        provider: &str,
        model: &str,
        request: Request,
        deadline: Option<Duration>,
    ) -> Result<Response, GatewayError> {
        let runtime = self
            .providers
            .get(provider)
            .ok_or_else(|| GatewayError::InvalidRequest(format!("unknown provider {provider}")))?;

        let key = KeySelector::select(&runtime.keys, model, &request.header.context)?;

        if !runtime.circuit_breaker.try_acquire() {
            return Err(GatewayError::CircuitOpen);
        }

        let dispatch = self.dispatch.clone();
        let provider_owned = provider.to_string();
        let breaker = runtime.circuit_breaker.clone();
        let started = Instant::now();

        let result = runtime
            .worker_pool
            .submit(deadline, move || async move {
                dispatch.call(&provider_owned, request, key).await
            })
            .await?;

        let latency = started.elapsed();
        let success = match &result {
            Ok(_) => true,
            Err(e) => !e.kind().counts_as_circuit_failure(),
        };
        breaker.record(success, latency);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::worker_pool::WorkerPoolConfig;
    use driftgate_schema::{ContextMap, FallbackTarget, OperationKind, RequestHeader};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn key(weight: f64) -> ProviderKey {
        ProviderKey {
            id: Uuid::new_v4(),
            value: "sk-test".into(),
            models: Default::default(),
            weight,
            provider_specific: None,
        }
    }

    fn request(provider: &str, fallbacks: Vec<FallbackTarget>) -> Request {
        Request {
            kind: OperationKind::ChatCompletion,
            header: RequestHeader {
                provider: provider.into(),
                model: "gpt-4o".into(),
                fallbacks,
                params: Default::default(),
                context: ContextMap::new(Uuid::new_v4()),
            },
            body: serde_json::json!({}),
        }
    }

    fn runtime() -> ProviderRuntime {
        ProviderRuntime {
            circuit_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            worker_pool: Arc::new(WorkerPool::new(WorkerPoolConfig {
                concurrency: 2,
                buffer_size: 4,
                drop_excess_requests: false,
            })),
            keys: vec![key(1.0)],
        }
    }

    struct FailThenSucceed {
        fail_providers: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderDispatch for FailThenSucceed {
        async fn call(
            &self,
            provider: &str,
            request: Request,
            _key: SelectedKey,
        ) -> Result<Response, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_providers.iter().any(|p| p == provider) {
                Err(GatewayError::UpstreamServerError("boom".into()))
            } else {
                Ok(Response {
                    kind: request.kind,
                    id: "resp-1".into(),
                    created: 0,
                    model: request.header.model,
                    body: serde_json::json!({"ok": true}),
                    usage: None,
                    raw_response: None,
                    extra_fields: Default::default(),
                })
            }
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_target_on_retryable_failure() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), runtime());
        providers.insert("openai".to_string(), runtime());

        let dispatch = Arc::new(FailThenSucceed {
            fail_providers: vec!["anthropic".to_string()],
            calls: AtomicUsize::new(0),
        });

        let pipeline = Pipeline::new(PluginChain::new(vec![]), dispatch.clone(), providers);
        let req = request(
            "anthropic",
            vec![FallbackTarget {
                provider: "openai".into(),
                model: "gpt-4o".into(),
            }],
        );
        let outcome = pipeline.run(req).await;
        assert!(outcome.error.is_none());
        assert!(outcome.response.is_some());
        assert_eq!(dispatch.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_failure_does_not_fall_back() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), runtime());
        providers.insert("openai".to_string(), runtime());

        let dispatch = Arc::new(FailThenSucceed {
            fail_providers: vec!["anthropic".to_string()],
            calls: AtomicUsize::new(0),
        });

        // Override with an adapter that returns a non-retryable error instead.
        struct InvalidRequestAlways;
        #[async_trait]
        impl ProviderDispatch for InvalidRequestAlways {
            async fn call(
                &self,
                _provider: &str,
                _request: Request,
                _key: SelectedKey,
            ) -> Result<Response, GatewayError> {
                Err(GatewayError::InvalidRequest("bad body".into()))
            }
        }
        let _ = dispatch;
        let pipeline = Pipeline::new(
            PluginChain::new(vec![]),
            Arc::new(InvalidRequestAlways),
            providers,
        );
        let req = request(
            "anthropic",
            vec![FallbackTarget {
                provider: "openai".into(),
                model: "gpt-4o".into(),
            }],
        );
        let outcome = pipeline.run(req).await;
        assert!(outcome.response.is_none());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn circuit_open_rejects_without_calling_adapter() {
        let mut providers = HashMap::new();
        let rt = runtime();
        // Force the provider's circuit open before dispatch.
        rt.circuit_breaker.force_open();
        providers.insert("openai".to_string(), rt);

        let dispatch = Arc::new(FailThenSucceed {
            fail_providers: vec![],
            calls: AtomicUsize::new(0),
        });
        let pipeline = Pipeline::new(PluginChain::new(vec![]), dispatch.clone(), providers);
        let req = request("openai", vec![]);
        let outcome = pipeline.run(req).await;
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::CircuitOpen);
        assert_eq!(dispatch.calls.load(Ordering::SeqCst), 0);
    }

    struct ShortCircuitingPlugin {
        allow_fallbacks: bool,
    }

    #[async_trait]
    impl Plugin for ShortCircuitingPlugin {
        fn name(&self) -> &str {
            "short-circuiter"
        }

        async fn pre_hook(&self, _request: Request) -> PreHookResult {
            PreHookResult::ShortCircuit(ShortCircuit {
                response: None,
                error: Some(CanonicalError::new(ErrorKind::PluginShortCircuit, "denied")),
                allow_fallbacks: self.allow_fallbacks,
            })
        }
    }

    #[tokio::test]
    async fn short_circuit_with_allow_fallbacks_dispatches_fallback() {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), runtime());

        let dispatch = Arc::new(FailThenSucceed {
            fail_providers: vec![],
            calls: AtomicUsize::new(0),
        });

        let chain = PluginChain::new(vec![Box::new(ShortCircuitingPlugin { allow_fallbacks: true })]);
        let pipeline = Pipeline::new(chain, dispatch.clone(), providers);
        let req = request(
            "anthropic",
            vec![FallbackTarget {
                provider: "openai".into(),
                model: "gpt-4o".into(),
            }],
        );
        let outcome = pipeline.run(req).await;
        assert!(outcome.response.is_some());
        assert!(outcome.error.is_none());
        assert_eq!(dispatch.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_circuit_without_allow_fallbacks_returns_short_circuit_outcome() {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), runtime());

        let dispatch = Arc::new(FailThenSucceed {
            fail_providers: vec![],
            calls: AtomicUsize::new(0),
        });

        let chain = PluginChain::new(vec![Box::new(ShortCircuitingPlugin { allow_fallbacks: false })]);
        let pipeline = Pipeline::new(chain, dispatch.clone(), providers);
        let req = request(
            "anthropic",
            vec![FallbackTarget {
                provider: "openai".into(),
                model: "gpt-4o".into(),
            }],
        );
        let outcome = pipeline.run(req).await;
        assert!(outcome.response.is_none());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::PluginShortCircuit);
        assert_eq!(dispatch.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_circuit_with_allow_fallbacks_but_no_fallbacks_configured_returns_short_circuit_outcome() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), runtime());

        let dispatch = Arc::new(FailThenSucceed {
            fail_providers: vec![],
            calls: AtomicUsize::new(0),
        });

        let chain = PluginChain::new(vec![Box::new(ShortCircuitingPlugin { allow_fallbacks: true })]);
        let pipeline = Pipeline::new(chain, dispatch.clone(), providers);
        let req = request("anthropic", vec![]);
        let outcome = pipeline.run(req).await;
        assert!(outcome.response.is_none());
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::PluginShortCircuit);
        assert_eq!(dispatch.calls.load(Ordering::SeqCst), 0);
    }
}
