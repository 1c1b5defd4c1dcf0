//! AI backends that turn an uploaded image into listing text.
//!
//! A provider is chosen once per job from [`ProviderKind`] and the supplied
//! credentials. Every call returns a `Result`; callers decide what to
//! substitute when a provider fails.

pub mod config;
pub mod gemini;
pub mod imaging;
pub mod ollama;
pub mod openai;
pub mod prompts;

use crate::credentials::Credential;
use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use config::ProviderConfig;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompts::{FieldContext, TitleMode};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} API key required")]
    MissingCredential(&'static str),
    #[error("no AI provider configured")]
    Disabled,
    #[error("http error: {0}")]
    Http(String),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("image preprocessing failed: {0}")]
    Image(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Title,
    Description,
    Tags,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::Description => "description",
            FieldKind::Tags => "tags",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "none")]
    None,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
            ProviderKind::None => "none",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "Openai",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Ollama => "Ollama",
            ProviderKind::None => "None",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub openai: Option<Credential>,
    pub gemini: Option<Credential>,
}

#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `false` only for the variant that never calls out.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn describe_image(&self, image: &[u8]) -> Result<String, ProviderError>;

    async fn generate(
        &self,
        field: FieldKind,
        context: &FieldContext,
        image: Option<&[u8]>,
    ) -> Result<String, ProviderError>;
}

/// Stand-in used when no credential is configured or `none` was chosen.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

#[async_trait]
impl VisionProvider for DisabledProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn describe_image(&self, _image: &[u8]) -> Result<String, ProviderError> {
        Err(ProviderError::Disabled)
    }

    async fn generate(
        &self,
        _field: FieldKind,
        _context: &FieldContext,
        _image: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Disabled)
    }
}

/// Picks the provider for a job. A cloud provider without a credential
/// degrades to [`DisabledProvider`].
pub fn select_provider(
    kind: ProviderKind,
    credentials: &ProviderCredentials,
    ollama_model: Option<&str>,
    config: &ProviderConfig,
) -> Arc<dyn VisionProvider> {
    require_provider(kind, credentials, ollama_model, config)
        .unwrap_or_else(|_| Arc::new(DisabledProvider) as Arc<dyn VisionProvider>)
}

/// Like [`select_provider`] but reports a missing credential instead of
/// degrading.
pub fn require_provider(
    kind: ProviderKind,
    credentials: &ProviderCredentials,
    ollama_model: Option<&str>,
    config: &ProviderConfig,
) -> Result<Arc<dyn VisionProvider>, ProviderError> {
    match kind {
        ProviderKind::OpenAi => {
            let key = credentials
                .openai
                .clone()
                .or_else(|| config.default_openai_key.clone())
                .ok_or(ProviderError::MissingCredential(kind.label()))?;
            Ok(Arc::new(OpenAiProvider::new(config, key)))
        }
        ProviderKind::Gemini => {
            let key = credentials
                .gemini
                .clone()
                .or_else(|| config.default_gemini_key.clone())
                .ok_or(ProviderError::MissingCredential(kind.label()))?;
            Ok(Arc::new(GeminiProvider::new(config, key)))
        }
        ProviderKind::Ollama => {
            let model = ollama_model
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(&config.ollama_model);
            Ok(Arc::new(OllamaProvider::new(config, model)))
        }
        ProviderKind::None => Err(ProviderError::Disabled),
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ProviderError::InvalidResponse(err.to_string()))
}

pub(crate) fn non_empty(text: Option<String>) -> Result<String, ProviderError> {
    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("empty response".into()))
}
