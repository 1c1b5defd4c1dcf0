use crate::http::build_client_with_timeout;
use crate::provider::imaging::prepare;
use crate::provider::prompts::{DESCRIBE_PROMPT, local_field_prompt};
use crate::provider::{
    FieldContext, FieldKind, ProviderConfig, ProviderError, VisionProvider, non_empty, read_json,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Local model server. No credential; longer timeout than the cloud
/// providers.
pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
    max_dimension: u32,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig, model: &str) -> Self {
        Self {
            http: build_client_with_timeout(config.local_timeout),
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            max_dimension: config.max_image_dimension,
        }
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|err| ProviderError::Http(err.to_string()))?;
        let payload: TagsResponse = read_json(response).await?;
        Ok(payload.models.into_iter().map(|m| m.name).collect())
    }

    async fn complete(&self, prompt: String, image: Option<&[u8]>) -> Result<String, ProviderError> {
        let images = match image {
            Some(bytes) => vec![prepare(bytes, self.max_dimension).await?.base64()],
            None => Vec::new(),
        };
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images,
            stream: false,
        };
        debug!(target = "podbulk.provider", provider = "ollama", model = %self.model, "generate");
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Http(err.to_string()))?;
        let payload: GenerateResponse = read_json(response).await?;
        non_empty(payload.response)
    }
}

#[async_trait]
impl VisionProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn describe_image(&self, image: &[u8]) -> Result<String, ProviderError> {
        self.complete(DESCRIBE_PROMPT.to_string(), Some(image)).await
    }

    async fn generate(
        &self,
        field: FieldKind,
        context: &FieldContext,
        image: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let prompt = local_field_prompt(field, context, image.is_some());
        self.complete(prompt, image).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockOllama, png_bytes, spawn_router};
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

    async fn provider_for(mock: &MockOllama) -> OllamaProvider {
        let base = spawn_router(mock.router()).await;
        let config = ProviderConfig {
            ollama_url: base,
            ..ProviderConfig::default()
        };
        OllamaProvider::new(&config, "llava")
    }

    #[tokio::test]
    async fn title_uses_short_prompt_and_bounded_image() {
        let mock = MockOllama::new();
        mock.reply_when("1-3 words", "Sunset Fox");
        let provider = provider_for(&mock).await;

        let title = provider
            .generate(FieldKind::Title, &FieldContext::default(), Some(&png_bytes(3000, 1500)))
            .await
            .expect("title");
        assert_eq!(title, "Sunset Fox");

        let images = mock.images();
        assert_eq!(images.len(), 1);
        let decoded = image::load_from_memory(&BASE64.decode(&images[0]).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 512));
    }

    #[tokio::test]
    async fn empty_reply_and_server_errors_fail() {
        let mock = MockOllama::new();
        let provider = provider_for(&mock).await;
        let err = provider
            .describe_image(&png_bytes(8, 8))
            .await
            .expect_err("empty reply");
        assert!(matches!(err, ProviderError::InvalidResponse(_)));

        mock.fail_with(500);
        let err = provider
            .generate(FieldKind::Tags, &FieldContext::default(), None)
            .await
            .expect_err("server error");
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn lists_installed_models() {
        let mock = MockOllama::new();
        let provider = provider_for(&mock).await;
        let models = provider.list_models().await.expect("models");
        assert_eq!(models, vec!["llava:latest", "bakllava:7b"]);
    }
}
