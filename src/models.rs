use crate::content::{Rules, RulesInput};
use crate::credentials::{Credential, first_present};
use crate::provider::{ProviderCredentials, ProviderKind};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use uuid::Uuid;

const PREVIEW_TITLE_TEMPLATE: &str = "[AI-Generated Title] [Custom Text]";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductsRequest {
    pub images: Vec<String>,
    #[serde(default)]
    pub placement_mode: String,
    #[serde(deserialize_with = "id_string")]
    pub store_id: String,
    #[serde(deserialize_with = "id_string")]
    pub product_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub openai_key: Option<String>,
    #[serde(default)]
    pub gemini_key: Option<String>,
    #[serde(default)]
    pub custom_html: Option<String>,
    #[serde(default)]
    pub rules: RulesInput,
}

impl CreateProductsRequest {
    pub fn catalog_key(&self) -> Option<Credential> {
        Credential::from_optional(self.api_key.as_deref())
    }

    pub fn provider_credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            openai: first_present(&[self.openai_key.as_deref(), self.rules.openai_key.as_deref()]),
            gemini: Credential::from_optional(self.gemini_key.as_deref()),
        }
    }

    pub fn rules(&self) -> Rules {
        self.rules.clone().resolve(self.custom_html.clone())
    }
}

#[derive(Debug, Serialize)]
pub struct CreationStarted {
    pub message: &'static str,
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Body shared by the three single-field generation endpoints; each reads
/// the fields it needs.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    pub provider: ProviderKind,
    pub openai_key: Option<String>,
    pub gemini_key: Option<String>,
    pub ollama_model: Option<String>,
    pub image_path: Option<String>,
    pub mode: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub segments: Option<u32>,
    pub template: Option<String>,
    pub custom_title_text: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub paragraphs: Option<u32>,
    pub influencer_phrases: Option<String>,
    pub custom_html: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub max_tags: Option<usize>,
    pub evergreen: Option<String>,
}

impl GenerateRequest {
    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            openai: Credential::from_optional(self.openai_key.as_deref()),
            gemini: Credential::from_optional(self.gemini_key.as_deref()),
        }
    }

    pub fn rules(&self) -> Rules {
        RulesInput {
            ai_provider: self.provider,
            title_template: Some(
                self.template
                    .clone()
                    .unwrap_or_else(|| PREVIEW_TITLE_TEMPLATE.to_string()),
            ),
            custom_title_text: self.custom_title_text.clone(),
            paragraphs: self.paragraphs,
            influencer_phrases: self.influencer_phrases.clone(),
            ollama_model: self.ollama_model.clone(),
            max_ai_tags: self.max_tags,
            ai_title_mode: self.mode.clone(),
            compound_segments: self.segments,
            evergreen_tags: self.evergreen.clone(),
            ..RulesInput::default()
        }
        .resolve(self.custom_html.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsQuery {
    pub store_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetailsQuery {
    pub store_id: String,
    pub product_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            error: error.into(),
            detail,
        }
    }
}

/// Shop and product ids arrive as strings from the form and as numbers
/// from scripted clients.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(text) => text.trim().to_string(),
        Repr::Number(number) => number.to_string(),
    })
}
