use async_trait::async_trait;
use driftgate_schema::{CanonicalError, Request, Response};

/// A plugin's directive to skip remaining pre-hooks and provider dispatch,
/// returning a supplied response or error directly (spec §4.6, Glossary
/// "Short-circuit").
pub struct ShortCircuit {
    pub response: Option<Response>,
    pub error: Option<CanonicalError>,
    pub allow_fallbacks: bool,
}

pub enum PreHookResult {
    Continue(Request),
    ShortCircuit(ShortCircuit),
    /// The plugin itself errored (a plugin bug, not a request-level error).
    /// The chain logs it and continues with the pre-mutation request, which
    /// the plugin must hand back unchanged.
    RuntimeError(Request, String),
}

pub struct PostHookOutcome {
    pub response: Option<Response>,
    pub error: Option<CanonicalError>,
}

pub enum PostHookResult {
    Replace(PostHookOutcome),
    RuntimeError(String),
}

/// A single plugin in the chain. Implementations must be safe for
/// concurrent invocation; per-request state should be keyed by
/// `context.request_id` (e.g. the accumulator).
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn pre_hook(&self, request: Request) -> PreHookResult {
        PreHookResult::Continue(request)
    }

    async fn post_hook(
        &self,
        response: Option<Response>,
        error: Option<CanonicalError>,
    ) -> PostHookResult {
        PostHookResult::Replace(PostHookOutcome { response, error })
    }

    async fn cleanup(&self) {}
}

/// Outcome of running the pre-hook phase across the whole chain.
pub enum PipelinePreOutcome {
    /// All plugins ran (or were skipped on a runtime error); carries the
    /// request as mutated by the chain and the indices of the plugins whose
    /// pre-hook actually completed, in registration order, for symmetric
    /// unwinding.
    Continue {
        request: Request,
        completed: Vec<usize>,
    },
    /// A plugin short-circuited; `outcome` has already been unwound through
    /// the post-hooks of every plugin that completed pre-hook at or before
    /// the short-circuiting one. `request` is the request as it stood going
    /// into the short-circuiting plugin's pre-hook, kept so the pipeline can
    /// still attempt it against `request.header.fallbacks` when
    /// `allow_fallbacks` is set.
    ShortCircuited {
        outcome: PostHookOutcome,
        allow_fallbacks: bool,
        request: Request,
    },
}

/// Ordered list of plugins implementing short-circuit, symmetric unwinding,
/// and recovery semantics (spec §4.6).
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginChain {
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// Run PreHook in registration order. On short-circuit, immediately
    /// unwind PostHook — in reverse order — across every plugin that
    /// completed PreHook so far (including the short-circuiting one itself),
    /// per spec §4.6.
    pub async fn run_pre(&self, mut request: Request) -> PipelinePreOutcome {
        let mut completed = Vec::new();
        for (idx, plugin) in self.plugins.iter().enumerate() {
            let snapshot = request.clone();
            match plugin.pre_hook(request).await {
                PreHookResult::Continue(mutated) => {
                    request = mutated;
                    completed.push(idx);
                }
                PreHookResult::ShortCircuit(sc) => {
                    completed.push(idx);
                    let outcome = PostHookOutcome {
                        response: sc.response,
                        error: sc.error,
                    };
                    let unwound = self.unwind_post(&completed, outcome).await;
                    return PipelinePreOutcome::ShortCircuited {
                        outcome: unwound,
                        allow_fallbacks: sc.allow_fallbacks,
                        request: snapshot,
                    };
                }
                PreHookResult::RuntimeError(unchanged, msg) => {
                    tracing::warn!(plugin = plugin.name(), error = %msg, "plugin pre_hook runtime error, skipping");
                    request = unchanged;
                }
            }
        }
        PipelinePreOutcome::Continue { request, completed }
    }

    /// Run PostHook across `completed` indices in reverse order, threading
    /// the (response, error) tuple through each plugin. A plugin runtime
    /// error is logged and the prior tuple carries forward unchanged.
    pub async fn unwind_post(&self, completed: &[usize], mut outcome: PostHookOutcome) -> PostHookOutcome {
        for &idx in completed.iter().rev() {
            let plugin = &self.plugins[idx];
            let response = outcome.response.clone();
            let error = outcome.error.clone();
            match plugin.post_hook(response, error).await {
                PostHookResult::Replace(next) => outcome = next,
                PostHookResult::RuntimeError(msg) => {
                    tracing::warn!(plugin = plugin.name(), error = %msg, "plugin post_hook runtime error, carrying prior outcome forward");
                }
            }
        }
        outcome
    }

    /// Run PostHook for the normal (non-short-circuit) path, across the
    /// indices whose PreHook completed, in reverse order.
    pub async fn run_post(&self, completed: &[usize], outcome: PostHookOutcome) -> PostHookOutcome {
        self.unwind_post(completed, outcome).await
    }

    pub async fn cleanup_all(&self) {
        for plugin in &self.plugins {
            plugin.cleanup().await;
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftgate_schema::{ContextMap, OperationKind, RequestHeader};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    fn sample_request() -> Request {
        Request {
            kind: OperationKind::ChatCompletion,
            header: RequestHeader {
                provider: "openai".into(),
                model: "gpt-4o".into(),
                fallbacks: vec![],
                params: Default::default(),
                context: ContextMap::new(Uuid::new_v4()),
            },
            body: serde_json::json!({}),
        }
    }

    struct CountingPlugin {
        name: String,
        pre_calls: Arc<AtomicUsize>,
        post_calls: Arc<AtomicUsize>,
        short_circuit_at: bool,
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        async fn pre_hook(&self, request: Request) -> PreHookResult {
            self.pre_calls.fetch_add(1, Ordering::SeqCst);
            if self.short_circuit_at {
                PreHookResult::ShortCircuit(ShortCircuit {
                    response: None,
                    error: Some(CanonicalError::new(
                        driftgate_schema::ErrorKind::PluginShortCircuit,
                        "stop here",
                    )),
                    allow_fallbacks: false,
                })
            } else {
                PreHookResult::Continue(request)
            }
        }

        async fn post_hook(
            &self,
            response: Option<Response>,
            error: Option<CanonicalError>,
        ) -> PostHookResult {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            PostHookResult::Replace(PostHookOutcome { response, error })
        }
    }

    #[tokio::test]
    async fn short_circuit_unwinds_only_prior_plugins_in_reverse() {
        let pre = Arc::new(AtomicUsize::new(0));
        let post_0 = Arc::new(AtomicUsize::new(0));
        let post_1 = Arc::new(AtomicUsize::new(0));
        let post_2 = Arc::new(AtomicUsize::new(0));

        let chain = PluginChain::new(vec![
            Box::new(CountingPlugin {
                name: "p0".into(),
                pre_calls: pre.clone(),
                post_calls: post_0.clone(),
                short_circuit_at: false,
            }),
            Box::new(CountingPlugin {
                name: "p1".into(),
                pre_calls: pre.clone(),
                post_calls: post_1.clone(),
                short_circuit_at: true,
            }),
            Box::new(CountingPlugin {
                name: "p2".into(),
                pre_calls: pre.clone(),
                post_calls: post_2.clone(),
                short_circuit_at: false,
            }),
        ]);

        let outcome = chain.run_pre(sample_request()).await;
        match outcome {
            PipelinePreOutcome::ShortCircuited { outcome, .. } => {
                assert!(outcome.error.is_some());
            }
            PipelinePreOutcome::Continue { .. } => panic!("expected short-circuit"),
        }

        assert_eq!(post_0.load(Ordering::SeqCst), 1);
        assert_eq!(post_1.load(Ordering::SeqCst), 1);
        assert_eq!(post_2.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn post_hook_count_matches_pre_hook_count_on_full_pass() {
        let pre = Arc::new(AtomicUsize::new(0));
        let post_0 = Arc::new(AtomicUsize::new(0));
        let post_1 = Arc::new(AtomicUsize::new(0));

        let chain = PluginChain::new(vec![
            Box::new(CountingPlugin {
                name: "p0".into(),
                pre_calls: pre.clone(),
                post_calls: post_0.clone(),
                short_circuit_at: false,
            }),
            Box::new(CountingPlugin {
                name: "p1".into(),
                pre_calls: pre.clone(),
                post_calls: post_1.clone(),
                short_circuit_at: false,
            }),
        ]);

        let outcome = chain.run_pre(sample_request()).await;
        let completed = match outcome {
            PipelinePreOutcome::Continue { completed, .. } => completed,
            PipelinePreOutcome::ShortCircuited { .. } => panic!("expected continue"),
        };
        assert_eq!(completed, vec![0, 1]);

        let _ = chain
            .run_post(&completed, PostHookOutcome { response: None, error: None })
            .await;

        assert_eq!(pre.load(Ordering::SeqCst), 2);
        assert_eq!(post_0.load(Ordering::SeqCst), 1);
        assert_eq!(post_1.load(Ordering::SeqCst), 1);
    }
}
