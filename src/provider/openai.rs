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
const DESCRIBE_MAX_TOKENS: u32 = 200;

fn max_tokens(field: FieldKind) -> u32 {
    match field {
        FieldKind::Title => 50,
        FieldKind::Description => 200,
        FieldKind::Tags => 100,
    }
}

pub struct OpenAiProvider {
    http: Client,
    base_url: String,
    model: String,
    api_key: Credential,
    max_dimension: u32,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig, api_key: Credential) -> Self {
        Self {
            http: build_client_with_timeout(config.cloud_timeout),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            api_key,
            max_dimension: config.max_image_dimension,
        }
    }

    async fn chat(
        &self,
        prompt: String,
        image: Option<&[u8]>,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let mut content = vec![ContentPart::Text { text: prompt }];
        if let Some(bytes) = image {
            let prepared = prepare(bytes, self.max_dimension).await?;
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: prepared.data_url(),
                },
            });
        }
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens,
            temperature: TEMPERATURE,
        };
        debug!(target = "podbulk.provider", provider = "openai", model = %self.model, max_tokens, "chat completion");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Http(err.to_string()))?;
        let payload: ChatResponse = read_json(response).await?;
        non_empty(
            payload
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content),
        )
    }
}

#[async_trait]
impl VisionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn describe_image(&self, image: &[u8]) -> Result<String, ProviderError> {
        self.chat(DESCRIBE_PROMPT.to_string(), Some(image), DESCRIBE_MAX_TOKENS)
            .await
    }

    async fn generate(
        &self,
        field: FieldKind,
        context: &FieldContext,
        image: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let prompt = field_prompt(field, context, image.is_some());
        self.chat(prompt, image, max_tokens(field)).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_bytes, spawn_router};
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    async fn mock_openai(reply: Value, seen: Arc<Mutex<Vec<(Option<String>, Value)>>>) -> String {
        let router = Router::new().route(
            "/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen.clone();
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().unwrap().push((auth, body));
                    Json(reply)
                }
            }),
        );
        spawn_router(router).await
    }

    fn provider(base: String) -> OpenAiProvider {
        let config = ProviderConfig {
            openai_base_url: base,
            ..ProviderConfig::default()
        };
        OpenAiProvider::new(&config, Credential::new("sk-test").unwrap())
    }

    #[tokio::test]
    async fn sends_bounded_png_and_field_token_limit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = mock_openai(
            json!({"choices": [{"message": {"role": "assistant", "content": "  Fox Tee \n"}}]}),
            seen.clone(),
        )
        .await;
        let text = provider(base)
            .generate(FieldKind::Title, &FieldContext::default(), Some(&png_bytes(1500, 300)))
            .await
            .expect("title");
        assert_eq!(text, "Fox Tee");

        let seen = seen.lock().unwrap();
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], json!("gpt-4o"));
        assert_eq!(body["max_tokens"], json!(50));
        let parts = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], json!("text"));
        assert_eq!(parts[1]["type"], json!("image_url"));
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn empty_content_is_a_failure() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = mock_openai(json!({"choices": [{"message": {"content": "   "}}]}), seen).await;
        let err = provider(base)
            .generate(FieldKind::Tags, &FieldContext::default(), None)
            .await
            .expect_err("empty");
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
