use crate::catalog::TemplateProduct;
use crate::provider::{ProviderKind, TitleMode};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

pub const AI_TITLE_TOKEN: &str = "[AI-Generated Title]";
pub const CUSTOM_TEXT_TOKEN: &str = "[Custom Text]";
pub const DEFAULT_MAX_AI_TAGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleSource {
    Ai,
    Filename,
    #[default]
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionSource {
    Ai,
    #[default]
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Ai,
    #[default]
    Copy,
}

/// Rule fields as the browser form submits them. Numbers may arrive as
/// JSON numbers or as numeric strings.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesInput {
    pub title_source: TitleSource,
    pub desc_source: DescriptionSource,
    pub tag_source: TagSource,
    pub ai_provider: ProviderKind,
    pub title_template: Option<String>,
    pub custom_title_text: Option<String>,
    pub custom_html: Option<String>,
    #[serde(alias = "desc_paragraphs")]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub paragraphs: Option<u32>,
    pub influencer_phrases: Option<String>,
    pub ollama_model: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub max_ai_tags: Option<usize>,
    pub ai_title_mode: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub compound_segments: Option<u32>,
    pub evergreen_tags: Option<String>,
    /// Older clients send the OpenAI key inside the rules object.
    pub openai_key: Option<String>,
}

/// Per-job generation settings. Built once, read-only for the rest of the
/// job.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub title_source: TitleSource,
    pub desc_source: DescriptionSource,
    pub tag_source: TagSource,
    pub provider: ProviderKind,
    pub ollama_model: Option<String>,
    pub title_template: String,
    pub custom_title_text: String,
    pub custom_html: String,
    pub paragraphs: u32,
    pub influencer_phrases: String,
    pub title_mode: TitleMode,
    pub max_ai_tags: usize,
    pub evergreen_tags: Vec<String>,
    pub template_title: String,
    pub template_description: String,
    pub template_tags: Vec<String>,
}

impl Default for Rules {
    fn default() -> Self {
        RulesInput::default().resolve(None)
    }
}

impl RulesInput {
    /// `custom_html` from the top level of a submission wins over the one
    /// nested in the rules.
    pub fn resolve(self, custom_html: Option<String>) -> Rules {
        let title_mode = match self.ai_title_mode.as_deref().map(str::trim) {
            Some(mode) if mode.eq_ignore_ascii_case("compound") => TitleMode::Compound {
                segments: self.compound_segments.unwrap_or(1).max(1),
            },
            _ => TitleMode::Simple,
        };
        Rules {
            title_source: self.title_source,
            desc_source: self.desc_source,
            tag_source: self.tag_source,
            provider: self.ai_provider,
            ollama_model: self
                .ollama_model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            title_template: self
                .title_template
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| AI_TITLE_TOKEN.to_string()),
            custom_title_text: self.custom_title_text.unwrap_or_default(),
            custom_html: custom_html
                .filter(|html| !html.trim().is_empty())
                .or(self.custom_html)
                .unwrap_or_default(),
            paragraphs: self.paragraphs.unwrap_or(1).max(1),
            influencer_phrases: self.influencer_phrases.unwrap_or_default(),
            title_mode,
            max_ai_tags: self
                .max_ai_tags
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_AI_TAGS),
            evergreen_tags: split_tags(self.evergreen_tags.as_deref().unwrap_or_default()),
            template_title: String::new(),
            template_description: String::new(),
            template_tags: Vec::new(),
        }
    }
}

impl Rules {
    /// Copies the template's listing text into the rules so `copy` sources
    /// and the no-provider path can read it.
    pub fn with_template(mut self, template: &TemplateProduct) -> Self {
        self.template_title = template.title.clone();
        self.template_description = template.description.clone();
        self.template_tags = template.tags.clone();
        self
    }

    pub fn uses_ai(&self) -> bool {
        self.title_source == TitleSource::Ai
            || self.desc_source == DescriptionSource::Ai
            || self.tag_source == TagSource::Ai
    }

    /// Substitutes both title tokens.
    pub fn apply_title_template(&self, generated: &str) -> String {
        self.title_template
            .replace(AI_TITLE_TOKEN, generated)
            .replace(CUSTOM_TEXT_TOKEN, &self.custom_title_text)
            .trim()
            .to_string()
    }
}

/// Comma-separated tags, trimmed, unquoted, empties dropped, first
/// occurrence kept.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',') {
        let tag = tag
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '#')
            .trim();
        if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    }
    tags
}
