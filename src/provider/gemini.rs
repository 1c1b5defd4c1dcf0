use crate::credentials::Credential;
use crate::http::build_client_with_timeout;
use crate::provider::imaging::prepare;
use crate::provider::prompts::{DESCRIBE_PROMPT, field_prompt};
use crate::provider::{
    FieldContext, FieldKind, ProviderConfig, ProviderError, VisionProvider, non_empty, read_json,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const TEMPERATURE: f32 = 0.7;
const DESCRIBE_MAX_TOKENS: u32 = 400;

fn max_tokens(field: FieldKind) -> u32 {
    match field {
        FieldKind::Title => 60,
        FieldKind::Description => 400,
        FieldKind::Tags => 256,
    }
}

pub struct GeminiProvider {
    http: Client,
    base_url: String,
    model: String,
    api_key: Credential,
    max_dimension: u32,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig, api_key: Credential) -> Self {
        Self {
            http: build_client_with_timeout(config.cloud_timeout),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key,
            max_dimension: config.max_image_dimension,
        }
    }

    async fn generate_content(
        &self,
        prompt: String,
        image: Option<&[u8]>,
        max_output_tokens: u32,
    ) -> Result<String, ProviderError> {
        let mut parts = vec![Part::Text { text: prompt }];
        if let Some(bytes) = image {
            let prepared = prepare(bytes, self.max_dimension).await?;
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: prepared.mime_type(),
                    data: prepared.base64(),
                },
            });
        }
        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                max_output_tokens,
                temperature: TEMPERATURE,
            },
        };
        debug!(target = "podbulk.provider", provider = "gemini", model = %self.model, max_output_tokens, "generate content");
        let response = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Http(err.to_string()))?;
        let payload: GenerateResponse = read_json(response).await?;
        let text = payload.candidates.into_iter().next().map(|candidate| {
            candidate
                .content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        });
        non_empty(text)
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn describe_image(&self, image: &[u8]) -> Result<String, ProviderError> {
        self.generate_content(DESCRIBE_PROMPT.to_string(), Some(image), DESCRIBE_MAX_TOKENS)
            .await
    }

    async fn generate(
        &self,
        field: FieldKind,
        context: &FieldContext,
        image: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let prompt = field_prompt(field, context, image.is_some());
        self.generate_content(prompt, image, max_tokens(field)).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}
