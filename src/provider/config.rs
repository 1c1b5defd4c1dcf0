use crate::credentials::Credential;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_base_url: String,
    pub openai_model: String,
    pub default_openai_key: Option<Credential>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub default_gemini_key: Option<Credential>,
    pub ollama_url: String,
    pub ollama_model: String,
    pub cloud_timeout: Duration,
    pub local_timeout: Duration,
    pub max_image_dimension: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".into(),
            openai_model: "gpt-4o".into(),
            default_openai_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            gemini_model: "gemini-2.0-flash".into(),
            default_gemini_key: None,
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "llava".into(),
            cloud_timeout: Duration::from_secs(30),
            local_timeout: Duration::from_secs(120),
            max_image_dimension: 1024,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            openai_base_url: env_or("OPENAI_API_BASE", defaults.openai_base_url),
            openai_model: env_or("OPENAI_MODEL", defaults.openai_model),
            default_openai_key: Credential::from_optional(
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            ),
            gemini_base_url: env_or("GEMINI_API_BASE", defaults.gemini_base_url),
            gemini_model: env_or("GEMINI_MODEL", defaults.gemini_model),
            default_gemini_key: Credential::from_optional(
                std::env::var("GEMINI_API_KEY").ok().as_deref(),
            ),
            ollama_url: env_or("OLLAMA_URL", defaults.ollama_url),
            ollama_model: env_or("OLLAMA_MODEL", defaults.ollama_model),
            cloud_timeout: env_secs("PROVIDER_TIMEOUT_SECS").unwrap_or(defaults.cloud_timeout),
            local_timeout: env_secs("LOCAL_PROVIDER_TIMEOUT_SECS")
                .unwrap_or(defaults.local_timeout),
            max_image_dimension: std::env::var("MAX_IMAGE_DIMENSION")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_image_dimension),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
}
