//! Built-in provider presets.
//!
//! Each preset fixes the family, endpoint and default model for a hosted
//! provider. Keys never live here: they are read from `<ID>_API_KEY` (or the
//! entry's `api_key_env`) when the provider list is resolved.

use amas_types::llm::RequestFamily;

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Static description of a hosted provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderPreset {
    pub id: &'static str,
    pub display_name: &'static str,
    pub family: RequestFamily,
    pub base_url: &'static str,
    pub model_id: &'static str,
    pub priority: i32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub headers: &'static [(&'static str, &'static str)],
}

const fn openai_compatible(
    id: &'static str,
    display_name: &'static str,
    base_url: &'static str,
    model_id: &'static str,
    priority: i32,
) -> ProviderPreset {
    ProviderPreset {
        id,
        display_name,
        family: RequestFamily::OpenAiChat,
        base_url,
        model_id,
        priority,
        max_tokens: DEFAULT_MAX_TOKENS,
        timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        headers: &[],
    }
}

/// Presets in default priority order. Fast free tiers come first.
pub const PRESETS: &[ProviderPreset] = &[
    openai_compatible("cerebras", "Cerebras", "https://api.cerebras.ai/v1", "llama-3.3-70b", 1),
    openai_compatible("codestral", "Codestral", "https://codestral.mistral.ai/v1", "codestral-latest", 2),
    openai_compatible(
        "nvidia",
        "NVIDIA NIM",
        "https://integrate.api.nvidia.com/v1",
        "meta/llama-3.1-70b-instruct",
        3,
    ),
    openai_compatible(
        "groq",
        "Groq",
        "https://api.groq.com/openai/v1",
        "llama-3.3-70b-versatile",
        4,
    ),
    openai_compatible("chutes", "Chutes", "https://llm.chutes.ai/v1", "deepseek-ai/DeepSeek-V3", 5),
    ProviderPreset {
        id: "cohere",
        display_name: "Cohere",
        family: RequestFamily::CohereChat,
        base_url: "https://api.cohere.com/v2",
        model_id: "command-r-plus",
        priority: 6,
        max_tokens: DEFAULT_MAX_TOKENS,
        timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        headers: &[],
    },
    ProviderPreset {
        id: "gemini",
        display_name: "Google Gemini",
        family: RequestFamily::GeminiGenerateContent,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        model_id: "gemini-2.0-flash",
        priority: 7,
        max_tokens: 8192,
        timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        headers: &[],
    },
    openai_compatible("deepseek", "DeepSeek", "https://api.deepseek.com/v1", "deepseek-chat", 8),
    openai_compatible("mistral", "Mistral AI", "https://api.mistral.ai/v1", "mistral-large-latest", 9),
    ProviderPreset {
        id: "openrouter",
        display_name: "OpenRouter",
        family: RequestFamily::OpenAiChat,
        base_url: "https://openrouter.ai/api/v1",
        model_id: "meta-llama/llama-3.3-70b-instruct:free",
        priority: 10,
        max_tokens: DEFAULT_MAX_TOKENS,
        timeout_seconds: 60,
        headers: &[("X-Title", "AMAS")],
    },
    openai_compatible(
        "together",
        "Together AI",
        "https://api.together.xyz/v1",
        "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        11,
    ),
    openai_compatible(
        "fireworks",
        "Fireworks AI",
        "https://api.fireworks.ai/inference/v1",
        "accounts/fireworks/models/llama-v3p3-70b-instruct",
        12,
    ),
    openai_compatible("openai", "OpenAI", "https://api.openai.com/v1", "gpt-4o-mini", 13),
    openai_compatible("xai", "xAI", "https://api.x.ai/v1", "grok-2-latest", 14),
    openai_compatible("moonshot", "Moonshot AI", "https://api.moonshot.ai/v1", "moonshot-v1-8k", 15),
    openai_compatible("glm", "GLM (z.ai)", "https://api.z.ai/api/paas/v4", "glm-4.5", 16),
];

/// Look up a preset by id.
pub fn find_preset(id: &str) -> Option<&'static ProviderPreset> {
    PRESETS.iter().find(|p| p.id == id)
}
