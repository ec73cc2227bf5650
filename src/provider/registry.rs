//! Provider registry and per-role client resolution
//!
//! Model ids are `provider/model`, e.g. `deepseek/deepseek-chat`. The
//! registry maps the provider prefix to an API base URL and the
//! environment variable carrying its key; resolution fails closed before
//! any streaming starts.

use std::sync::Arc;

use serde::Serialize;

use super::{ChatApiClient, ClientHandle};

/// Static description of one supported provider.
pub struct ProviderSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub env_var: &'static str,
    pub base_url: &'static str,
    /// (model_id, display_name) pairs offered in the UI.
    pub models: &'static [(&'static str, &'static str)],
}

/// Every provider the server can talk to. All of them speak the
/// OpenAI-compatible Chat Completions protocol.
pub const PROVIDER_REGISTRY: &[ProviderSpec] = &[
    ProviderSpec {
        id: "deepseek",
        display_name: "DeepSeek",
        env_var: "DEEPSEEK_API_KEY",
        base_url: "https://api.deepseek.com/v1",
        models: &[
            ("deepseek/deepseek-chat", "DeepSeek Chat"),
            ("deepseek/deepseek-reasoner", "DeepSeek Reasoner"),
        ],
    },
    ProviderSpec {
        id: "zhipu",
        display_name: "Zhipu",
        env_var: "ZHIPU_API_KEY",
        base_url: "https://open.bigmodel.cn/api/paas/v4",
        models: &[
            ("zhipu/glm-4-plus", "GLM-4 Plus"),
            ("zhipu/glm-4-flash", "GLM-4 Flash"),
        ],
    },
    ProviderSpec {
        id: "groq",
        display_name: "Groq",
        env_var: "GROQ_API_KEY",
        base_url: "https://api.groq.com/openai/v1",
        models: &[
            ("groq/llama-3.3-70b-versatile", "Llama 3.3 70B"),
            ("groq/llama-3.1-8b-instant", "Llama 3.1 8B Instant"),
        ],
    },
    ProviderSpec {
        id: "mistral",
        display_name: "Mistral",
        env_var: "MISTRAL_API_KEY",
        base_url: "https://api.mistral.ai/v1",
        models: &[
            ("mistral/mistral-small-latest", "Mistral Small"),
            ("mistral/mistral-large-latest", "Mistral Large"),
        ],
    },
    ProviderSpec {
        id: "openai",
        display_name: "OpenAI",
        env_var: "OPENAI_API_KEY",
        base_url: "https://api.openai.com/v1",
        models: &[
            ("openai/gpt-4o", "GPT-4o"),
            ("openai/gpt-4o-mini", "GPT-4o Mini"),
        ],
    },
];

/// Why a model id could not be turned into a working client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Model id has no `provider/` prefix or the prefix is unknown.
    UnknownProvider(String),
    /// The provider's API key environment variable is unset.
    MissingApiKey {
        provider: String,
        env_var: &'static str,
    },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProvider(model_id) => {
                write!(f, "unknown provider for model '{model_id}'")
            }
            Self::MissingApiKey { provider, env_var } => {
                write!(f, "no API key for provider '{provider}' ({env_var} unset)")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Look up a provider spec by id.
pub fn provider_spec(id: &str) -> Option<&'static ProviderSpec> {
    PROVIDER_REGISTRY.iter().find(|p| p.id == id)
}

/// Resolve a full model id into a [`ClientHandle`].
pub fn resolve_client(model_id: &str) -> Result<ClientHandle, ResolveError> {
    let (provider_id, model) = model_id
        .split_once('/')
        .ok_or_else(|| ResolveError::UnknownProvider(model_id.to_string()))?;

    let spec = provider_spec(provider_id)
        .ok_or_else(|| ResolveError::UnknownProvider(model_id.to_string()))?;

    let api_key = std::env::var(spec.env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ResolveError::MissingApiKey {
            provider: spec.id.to_string(),
            env_var: spec.env_var,
        })?;

    tracing::info!(provider = spec.id, model = model_id, "client resolved");

    Ok(ClientHandle {
        provider: spec.id.to_string(),
        model_id: model_id.to_string(),
        client: Arc::new(ChatApiClient::new(spec.id, spec.base_url, api_key, model)),
    })
}

/// Resolve a role's client: a non-blank per-request override wins over
/// the configured default.
pub fn resolve_role_client(
    custom_model: Option<&str>,
    default_model: &str,
) -> Result<ClientHandle, ResolveError> {
    let model_id = custom_model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(default_model);
    resolve_client(model_id)
}

// ============================================================================
// Availability listing (for /api/models)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AvailableModel {
    pub model_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableProvider {
    pub provider: String,
    pub display_name: String,
    pub env_var: String,
    pub has_key: bool,
    pub models: Vec<AvailableModel>,
}

/// Snapshot of every registry provider with key availability from the
/// current environment.
pub fn detect_available_providers() -> Vec<AvailableProvider> {
    PROVIDER_REGISTRY
        .iter()
        .map(|spec| AvailableProvider {
            provider: spec.id.to_string(),
            display_name: spec.display_name.to_string(),
            env_var: spec.env_var.to_string(),
            has_key: std::env::var(spec.env_var)
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false),
            models: spec
                .models
                .iter()
                .map(|(id, name)| AvailableModel {
                    model_id: id.to_string(),
                    display_name: name.to_string(),
                })
                .collect(),
        })
        .collect()
}
