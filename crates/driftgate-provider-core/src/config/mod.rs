mod provider_config;

pub use provider_config::{
    AIStudioConfig, AzureConfig, BedrockConfig, ClaudeConfig, CohereConfig, MistralConfig,
    OpenAIConfig, ProviderSettings, VertexConfig,
};
