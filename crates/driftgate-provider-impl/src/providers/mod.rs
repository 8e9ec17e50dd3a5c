use std::sync::Arc;

use driftgate_provider_core::{ProviderRegistry, UpstreamProvider};

pub mod aistudio;
pub mod azure;
pub mod bedrock;
pub mod claude;
pub mod cohere;
pub mod mistral;
pub mod openai;
pub mod vertex;

/// One entry per built-in adapter, named to match `ProviderKey`'s `provider`
/// field and `ProviderSettings`'s config variants.
pub struct BuiltinProviderSeed {
    pub name: &'static str,
    pub provider: Arc<dyn UpstreamProvider>,
}

pub fn builtin_provider_seeds() -> Vec<BuiltinProviderSeed> {
    vec![
        BuiltinProviderSeed {
            name: "openai",
            provider: Arc::new(openai::OpenAIProvider::new()),
        },
        BuiltinProviderSeed {
            name: "azure",
            provider: Arc::new(azure::AzureProvider::new()),
        },
        BuiltinProviderSeed {
            name: "claude",
            provider: Arc::new(claude::ClaudeProvider::new()),
        },
        BuiltinProviderSeed {
            name: "aistudio",
            provider: Arc::new(aistudio::AIStudioProvider::new()),
        },
        BuiltinProviderSeed {
            name: "vertex",
            provider: Arc::new(vertex::VertexProvider::new()),
        },
        BuiltinProviderSeed {
            name: "bedrock",
            provider: Arc::new(bedrock::BedrockProvider::new()),
        },
        BuiltinProviderSeed {
            name: "cohere",
            provider: Arc::new(cohere::CohereProvider::new()),
        },
        BuiltinProviderSeed {
            name: "mistral",
            provider: Arc::new(mistral::MistralProvider::new()),
        },
    ]
}

pub fn register_builtin_providers(registry: &mut ProviderRegistry) {
    for seed in builtin_provider_seeds() {
        registry.register(seed.provider);
    }
}
