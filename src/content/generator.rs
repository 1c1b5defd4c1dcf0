use crate::content::rules::{
    DescriptionSource, Rules, TagSource, TitleSource, split_tags,
};
use crate::content::sanitize::clean_ai_response;
use crate::metrics;
use crate::provider::{FieldContext, FieldKind, ProviderError, VisionProvider};
use crate::uploads::{UploadArea, file_stem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_TITLE_CHARS: usize = 60;
pub const FALLBACK_DESCRIPTION: &str =
    "A unique print-on-demand product featuring custom artwork.";
pub const FALLBACK_TAGS: [&str; 3] = ["custom", "print-on-demand", "artwork"];

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedContent {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Tags(Vec<String>),
}

impl FieldValue {
    pub fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::Tags(tags) => tags.join(", "),
        }
    }

    pub fn into_tags(self) -> Vec<String> {
        match self {
            FieldValue::Tags(tags) => tags,
            FieldValue::Text(text) => split_tags(&text),
        }
    }
}

/// Produces listing text for one image according to the job's [`Rules`].
///
/// The public `generate*` entry points never fail: every provider error is
/// logged and replaced by a fallback. The `ai_*` methods expose the raw
/// provider result for callers that want to report failures themselves.
#[derive(Clone)]
pub struct ContentGenerator {
    provider: Arc<dyn VisionProvider>,
    uploads: UploadArea,
}

impl ContentGenerator {
    pub fn new(provider: Arc<dyn VisionProvider>, uploads: UploadArea) -> Self {
        Self { provider, uploads }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_enabled()
    }

    pub async fn generate(&self, rules: &Rules, image_name: &str) -> GeneratedContent {
        GeneratedContent {
            title: self
                .generate_field(FieldKind::Title, rules, image_name)
                .await
                .into_text(),
            description: self
                .generate_field(FieldKind::Description, rules, image_name)
                .await
                .into_text(),
            tags: self
                .generate_field(FieldKind::Tags, rules, image_name)
                .await
                .into_tags(),
        }
    }

    pub async fn generate_field(
        &self,
        field: FieldKind,
        rules: &Rules,
        image_name: &str,
    ) -> FieldValue {
        let image = self.image_for(field, rules, image_name).await;
        let image = image.as_deref();
        match field {
            FieldKind::Title => FieldValue::Text(self.title(rules, image_name, image).await),
            FieldKind::Description => FieldValue::Text(self.description(rules, image).await),
            FieldKind::Tags => FieldValue::Tags(self.tags(rules, image).await),
        }
    }

    pub async fn ai_title(
        &self,
        rules: &Rules,
        image: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let raw = self
            .provider
            .generate(FieldKind::Title, &field_context(rules), image)
            .await?;
        let title = first_line_unquoted(&raw);
        if title.is_empty() {
            return Err(ProviderError::InvalidResponse("empty title".into()));
        }
        Ok(clamp_title(&rules.apply_title_template(&title)))
    }

    pub async fn ai_description(
        &self,
        rules: &Rules,
        image: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let raw = self
            .provider
            .generate(FieldKind::Description, &field_context(rules), image)
            .await?;
        let cleaned = clean_ai_response(&limit_paragraphs(&raw, rules.paragraphs));
        if cleaned.is_empty() {
            return Err(ProviderError::InvalidResponse("empty description".into()));
        }
        Ok(cleaned + &rules.custom_html)
    }

    /// Asks for an image description first and feeds it into the tag
    /// prompt. A failed description only loses that hint.
    pub async fn ai_tags(
        &self,
        rules: &Rules,
        image: Option<&[u8]>,
    ) -> Result<Vec<String>, ProviderError> {
        let mut context = field_context(rules);
        if let Some(bytes) = image {
            match self.provider.describe_image(bytes).await {
                Ok(description) => context.image_description = Some(description),
                Err(err) => {
                    debug!(target = "podbulk.content", provider = self.provider.name(), error = %err, "image description unavailable")
                }
            }
        }
        let raw = self
            .provider
            .generate(FieldKind::Tags, &context, image)
            .await?;
        let mut tags = split_tags(&raw);
        tags.truncate(rules.max_ai_tags);
        if tags.is_empty() {
            return Err(ProviderError::InvalidResponse("no tags".into()));
        }
        Ok(with_evergreen(tags, &rules.evergreen_tags))
    }

    async fn title(&self, rules: &Rules, image_name: &str, image: Option<&[u8]>) -> String {
        let stem = file_stem(image_name);
        match rules.title_source {
            TitleSource::Filename => clamp_title(stem),
            TitleSource::Copy => clamp_title(&rules.template_title),
            TitleSource::Ai if !self.has_provider() => {
                clamp_title(non_empty_or(&rules.template_title, stem))
            }
            TitleSource::Ai => match self.ai_title(rules, image).await {
                Ok(title) => title,
                Err(err) => {
                    self.record_fallback(FieldKind::Title, &err);
                    clamp_title(&rules.apply_title_template(stem))
                }
            },
        }
    }

    async fn description(&self, rules: &Rules, image: Option<&[u8]>) -> String {
        match rules.desc_source {
            DescriptionSource::Copy => rules.template_description.clone(),
            DescriptionSource::Ai if !self.has_provider() => {
                non_empty_or(&rules.template_description, FALLBACK_DESCRIPTION).to_string()
            }
            DescriptionSource::Ai => match self.ai_description(rules, image).await {
                Ok(description) => description,
                Err(err) => {
                    self.record_fallback(FieldKind::Description, &err);
                    FALLBACK_DESCRIPTION.to_string() + &rules.custom_html
                }
            },
        }
    }

    async fn tags(&self, rules: &Rules, image: Option<&[u8]>) -> Vec<String> {
        match rules.tag_source {
            TagSource::Copy => with_evergreen(rules.template_tags.clone(), &rules.evergreen_tags),
            TagSource::Ai if !self.has_provider() => {
                if rules.template_tags.is_empty() {
                    fallback_tags()
                } else {
                    rules.template_tags.clone()
                }
            }
            TagSource::Ai => match self.ai_tags(rules, image).await {
                Ok(tags) => tags,
                Err(err) => {
                    self.record_fallback(FieldKind::Tags, &err);
                    fallback_tags()
                }
            },
        }
    }

    /// Image bytes are only read when the field will reach the provider.
    async fn image_for(&self, field: FieldKind, rules: &Rules, image_name: &str) -> Option<Vec<u8>> {
        let ai = match field {
            FieldKind::Title => rules.title_source == TitleSource::Ai,
            FieldKind::Description => rules.desc_source == DescriptionSource::Ai,
            FieldKind::Tags => rules.tag_source == TagSource::Ai,
        };
        if !ai || !self.has_provider() {
            return None;
        }
        match self.uploads.read(image_name).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(target = "podbulk.content", image = image_name, error = %err, "image unreadable, generating without it");
                None
            }
        }
    }

    fn record_fallback(&self, field: FieldKind, err: &ProviderError) {
        warn!(
            target = "podbulk.content",
            provider = self.provider.name(),
            field = field.as_str(),
            error = %err,
            "provider failed, using fallback"
        );
        metrics::provider_fallback(self.provider.name(), field.as_str());
    }
}

pub fn fallback_tags() -> Vec<String> {
    FALLBACK_TAGS.iter().map(|t| t.to_string()).collect()
}

/// Truncates on a character boundary.
pub fn clamp_title(title: &str) -> String {
    title
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

pub(crate) fn field_context(rules: &Rules) -> FieldContext {
    FieldContext {
        title_mode: rules.title_mode,
        paragraphs: rules.paragraphs,
        influencer_phrases: rules.influencer_phrases.clone(),
        tag_count: rules.max_ai_tags,
        image_description: None,
    }
}

fn first_line_unquoted(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}

fn limit_paragraphs(raw: &str, paragraphs: u32) -> String {
    PARAGRAPH_BREAK
        .split(raw.trim())
        .take(paragraphs.max(1) as usize)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn with_evergreen(mut tags: Vec<String>, evergreen: &[String]) -> Vec<String> {
    for tag in evergreen {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.clone());
        }
    }
    tags
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::rules::RulesInput;
    use crate::provider::{DisabledProvider, ProviderKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Canned replies per field; `None` simulates a provider failure.
    struct ScriptedProvider {
        title: Option<&'static str>,
        description: Option<&'static str>,
        tags: Option<&'static str>,
        describe: Option<&'static str>,
        prompts: Mutex<Vec<(FieldKind, Option<String>, bool)>>,
    }

    impl ScriptedProvider {
        fn failing() -> Self {
            Self {
                title: None,
                description: None,
                tags: None,
                describe: None,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn describe_image(&self, _image: &[u8]) -> Result<String, ProviderError> {
            self.describe
                .map(str::to_string)
                .ok_or(ProviderError::Http("down".into()))
        }

        async fn generate(
            &self,
            field: FieldKind,
            context: &FieldContext,
            image: Option<&[u8]>,
        ) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push((
                field,
                context.image_description.clone(),
                image.is_some(),
            ));
            let reply = match field {
                FieldKind::Title => self.title,
                FieldKind::Description => self.description,
                FieldKind::Tags => self.tags,
            };
            reply
                .map(str::to_string)
                .ok_or(ProviderError::Status { status: 500, body: "boom".into() })
        }
    }

    fn ai_rules() -> Rules {
        RulesInput {
            title_source: TitleSource::Ai,
            desc_source: DescriptionSource::Ai,
            tag_source: TagSource::Ai,
            ai_provider: ProviderKind::Ollama,
            ..RulesInput::default()
        }
        .resolve(None)
    }

    fn uploads_with(name: &str) -> (tempfile::TempDir, UploadArea) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(name), b"raw").unwrap();
        let area = UploadArea::new(dir.path());
        (dir, area)
    }

    #[tokio::test]
    async fn failures_fall_back_to_fixed_values() {
        let (_dir, uploads) = uploads_with("sunset-fox.png");
        let generator = ContentGenerator::new(Arc::new(ScriptedProvider::failing()), uploads);
        let mut rules = ai_rules();
        rules.title_template = "[AI-Generated Title] Tee".into();

        let content = generator.generate(&rules, "sunset-fox.png").await;
        assert_eq!(content.title, "sunset-fox Tee");
        assert_eq!(content.description, FALLBACK_DESCRIPTION);
        assert!(!content.description.contains('*'));
        assert_eq!(content.tags, vec!["custom", "print-on-demand", "artwork"]);
    }

    #[tokio::test]
    async fn fallback_description_keeps_custom_html() {
        let (_dir, uploads) = uploads_with("a.png");
        let generator = ContentGenerator::new(Arc::new(ScriptedProvider::failing()), uploads);
        let mut rules = ai_rules();
        rules.custom_html = "<p>Care: wash cold</p>".into();

        let content = generator.generate(&rules, "a.png").await;
        assert_eq!(
            content.description,
            format!("{FALLBACK_DESCRIPTION}<p>Care: wash cold</p>")
        );
    }

    #[tokio::test]
    async fn empty_tag_replies_fall_back_to_fixed_tags() {
        for reply in ["", " , ,"] {
            let (_dir, uploads) = uploads_with("a.png");
            let provider = Arc::new(ScriptedProvider {
                tags: Some(reply),
                ..ScriptedProvider::failing()
            });
            let generator = ContentGenerator::new(provider, uploads);
            let mut rules = ai_rules();
            rules.evergreen_tags = vec!["gift".into()];

            let content = generator.generate(&rules, "a.png").await;
            assert_eq!(content.tags, fallback_tags(), "reply: {reply:?}");
        }
    }

    #[tokio::test]
    async fn successful_replies_are_post_processed() {
        let (_dir, uploads) = uploads_with("a.png");
        let provider = Arc::new(ScriptedProvider {
            title: Some("\"An Extremely Long Creative Title That Keeps Going Well Past Sixty\"\nsecond line"),
            description: Some("First **bold** para.\n\nSecond para.\n\nThird para."),
            tags: Some("fox, forest, fox, wild, night"),
            describe: Some("a fox in a forest"),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = ContentGenerator::new(provider.clone(), uploads);
        let mut rules = ai_rules();
        rules.paragraphs = 2;
        rules.max_ai_tags = 2;
        rules.custom_html = "<p>Care: wash cold</p>".into();
        rules.evergreen_tags = vec!["gift".into(), "Fox".into()];

        let content = generator.generate(&rules, "a.png").await;
        assert_eq!(
            content.title,
            "An Extremely Long Creative Title That Keeps Going Well Past"
        );
        assert_eq!(
            content.description,
            "<p>First <strong>bold</strong> para.</p><p>Second para.</p><p>Care: wash cold</p>"
        );
        assert_eq!(content.tags, vec!["fox", "forest", "gift"]);

        let prompts = provider.prompts.lock().unwrap();
        let tag_call = prompts.iter().find(|(f, _, _)| *f == FieldKind::Tags).unwrap();
        assert_eq!(tag_call.1.as_deref(), Some("a fox in a forest"));
        assert!(prompts.iter().all(|(_, _, with_image)| *with_image));
    }

    #[tokio::test]
    async fn non_ai_sources_never_call_the_provider() {
        let provider = Arc::new(ScriptedProvider::failing());
        let generator = ContentGenerator::new(provider.clone(), UploadArea::new("/nonexistent"));
        let mut rules = RulesInput {
            title_source: TitleSource::Filename,
            evergreen_tags: Some("gift".into()),
            ..RulesInput::default()
        }
        .resolve(None);
        rules.template_description = "D".into();
        rules.template_tags = vec!["x".into()];

        let content = generator.generate(&rules, "summer.sale.png").await;
        assert_eq!(content.title, "summer.sale");
        assert_eq!(content.description, "D");
        assert_eq!(content.tags, vec!["x", "gift"]);
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ai_without_provider_reads_the_template() {
        let generator =
            ContentGenerator::new(Arc::new(DisabledProvider), UploadArea::new("/nonexistent"));
        let mut rules = ai_rules();
        rules.template_title = "Template Title".into();

        let content = generator.generate(&rules, "img.png").await;
        assert_eq!(content.title, "Template Title");
        assert_eq!(content.description, FALLBACK_DESCRIPTION);
        assert_eq!(content.tags, fallback_tags());

        let value = generator.generate_field(FieldKind::Title, &rules, "img.png").await;
        assert_eq!(value, FieldValue::Text("Template Title".into()));
    }

    #[test]
    fn clamp_title_counts_characters_not_bytes() {
        let title = "é".repeat(80);
        assert_eq!(clamp_title(&title).chars().count(), MAX_TITLE_CHARS);
    }
}
