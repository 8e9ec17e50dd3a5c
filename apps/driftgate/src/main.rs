use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use driftgate_core::{
    AccumulatorStore, AdapterDispatch, CircuitBreaker, CircuitBreakerConfig, Pipeline, PluginChain,
    ProviderRuntime, UpstreamClient, UpstreamClientConfig, WorkerPool, WorkerPoolConfig,
};
use driftgate_provider_core::ProviderRegistry;
use driftgate_router::{AppState, DialectProviders, LargePayloadConfig, StreamingRuntime};

mod cli;

/// Which aggregate-route dialect family a built-in provider name speaks, so
/// `DialectProviders` only ever routes a dialect's requests to providers
/// that actually understand its wire shape (spec §6).
fn dialect_for_provider(name: &str) -> Option<&'static str> {
    match name {
        "openai" | "azure" => Some("openai"),
        "claude" => Some("anthropic"),
        "aistudio" | "vertex" => Some("genai"),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();
    let file_path = cli.config.as_ref().map(PathBuf::from);
    let patch = driftgate_config::load(file_path.as_deref())?.overlay(cli.as_patch());
    let global = patch.into_config()?;

    let mut registry = ProviderRegistry::new();
    driftgate_provider_impl::register_builtin_providers(&mut registry);
    let registry = Arc::new(registry);

    let provider_settings = Arc::new(global.provider_settings.clone());
    let network_configs = Arc::new(
        global
            .providers
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.network.clone()))
            .collect::<HashMap<_, _>>(),
    );

    let upstream = Arc::new(UpstreamClient::new(UpstreamClientConfig::default())?);

    let mut dialect_providers = DialectProviders::default();
    let mut pipeline_providers = HashMap::new();
    let mut streaming_runtimes = HashMap::new();

    for (name, provider_cfg) in &global.providers {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let worker_pool = Arc::new(WorkerPool::new(WorkerPoolConfig {
            concurrency: provider_cfg.concurrency,
            buffer_size: provider_cfg.buffer_size.unwrap_or(provider_cfg.concurrency * 4),
            drop_excess_requests: global.drop_excess_requests,
        }));

        pipeline_providers.insert(
            name.clone(),
            ProviderRuntime {
                circuit_breaker: breaker.clone(),
                worker_pool,
                keys: provider_cfg.keys.clone(),
            },
        );
        streaming_runtimes.insert(
            name.clone(),
            StreamingRuntime {
                circuit_breaker: breaker,
                keys: provider_cfg.keys.clone(),
            },
        );

        match dialect_for_provider(name) {
            Some("openai") => dialect_providers.openai.push(name.clone()),
            Some("anthropic") => dialect_providers.anthropic.push(name.clone()),
            Some("genai") => dialect_providers.genai.push(name.clone()),
            _ => tracing::warn!(provider = %name, "configured provider has no known aggregate-route dialect"),
        }
    }

    let dispatch = Arc::new(AdapterDispatch::new(
        registry.clone(),
        provider_settings.clone(),
        network_configs,
        upstream.clone(),
    ));
    let pipeline = Arc::new(Pipeline::new(PluginChain::new(vec![]), dispatch, pipeline_providers));

    let state = AppState {
        pipeline,
        registry,
        provider_settings,
        upstream,
        streaming: Arc::new(streaming_runtimes),
        accumulators: Arc::new(AccumulatorStore::default()),
        dialect_providers: Arc::new(dialect_providers),
        large_payload: LargePayloadConfig {
            threshold_bytes: global.large_payload_threshold_bytes,
            prefetch_bytes: global.prefetch_size_bytes as usize,
        },
    };

    let app = driftgate_router::build_router(state);

    let bind = format!("{}:{}", global.host, global.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
