//! One-off generation of a single field, outside any job. Unlike the job
//! path, provider failures are reported to the caller instead of replaced.

use crate::content::generator::{ContentGenerator, FieldValue};
use crate::content::rules::Rules;
use crate::provider::{
    FieldKind, ProviderConfig, ProviderCredentials, ProviderError, ProviderKind, require_provider,
};
use crate::uploads::{UploadArea, UploadError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    ProviderUnavailable(ProviderError),
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("generation failed: {0}")]
    Provider(ProviderError),
}

pub fn preview_generator(
    kind: ProviderKind,
    credentials: &ProviderCredentials,
    ollama_model: Option<&str>,
    config: &ProviderConfig,
    uploads: UploadArea,
) -> Result<ContentGenerator, ContentError> {
    let provider = require_provider(kind, credentials, ollama_model, config)
        .map_err(ContentError::ProviderUnavailable)?;
    Ok(ContentGenerator::new(provider, uploads))
}

/// `image_path` is optional; when given it must name an existing upload.
pub async fn preview_field(
    generator: &ContentGenerator,
    uploads: &UploadArea,
    field: FieldKind,
    rules: &Rules,
    image_path: Option<&str>,
) -> Result<FieldValue, ContentError> {
    let image = match image_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(name) => Some(uploads.read(name).await.map_err(|err| match err {
            UploadError::NotFound(name) | UploadError::InvalidName(name) => {
                ContentError::ImageNotFound(name)
            }
            UploadError::Read { name, .. } => ContentError::ImageNotFound(name),
        })?),
        None => None,
    };
    let image = image.as_deref();
    info!(
        target = "podbulk.content",
        provider = generator.provider_name(),
        field = field.as_str(),
        with_image = image.is_some(),
        "preview generation"
    );
    let value = match field {
        FieldKind::Title => FieldValue::Text(
            generator
                .ai_title(rules, image)
                .await
                .map_err(ContentError::Provider)?,
        ),
        FieldKind::Description => FieldValue::Text(
            generator
                .ai_description(rules, image)
                .await
                .map_err(ContentError::Provider)?,
        ),
        FieldKind::Tags => FieldValue::Tags(
            generator
                .ai_tags(rules, image)
                .await
                .map_err(ContentError::Provider)?,
        ),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockOllama, png_bytes, spawn_router};

    async fn ollama_setup(mock: &MockOllama) -> (tempfile::TempDir, UploadArea, ContentGenerator) {
        let base = spawn_router(mock.router()).await;
        let config = ProviderConfig {
            ollama_url: base,
            ..ProviderConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fox.png"), png_bytes(16, 16)).unwrap();
        let uploads = UploadArea::new(dir.path());
        let generator = preview_generator(
            ProviderKind::Ollama,
            &ProviderCredentials::default(),
            Some("llava"),
            &config,
            uploads.clone(),
        )
        .expect("ollama needs no key");
        (dir, uploads, generator)
    }

    #[test]
    fn cloud_preview_requires_a_key() {
        let err = preview_generator(
            ProviderKind::OpenAi,
            &ProviderCredentials::default(),
            None,
            &ProviderConfig::default(),
            UploadArea::new("uploads"),
        )
        .err()
        .expect("missing key");
        assert!(matches!(err, ContentError::ProviderUnavailable(_)));
        assert_eq!(err.to_string(), "Openai API key required");
    }

    #[tokio::test]
    async fn title_preview_applies_template() {
        let mock = MockOllama::new();
        mock.reply_when("1-3 words", "Night Fox");
        let (_dir, uploads, generator) = ollama_setup(&mock).await;
        let mut rules = Rules::default();
        rules.title_template = "[AI-Generated Title] [Custom Text]".into();
        rules.custom_title_text = "Tee".into();

        let value = preview_field(&generator, &uploads, FieldKind::Title, &rules, Some("fox.png"))
            .await
            .expect("title");
        assert_eq!(value, FieldValue::Text("Night Fox Tee".into()));
    }

    #[tokio::test]
    async fn missing_image_and_provider_failure_are_errors() {
        let mock = MockOllama::new();
        let (_dir, uploads, generator) = ollama_setup(&mock).await;
        let rules = Rules::default();

        let err = preview_field(&generator, &uploads, FieldKind::Tags, &rules, Some("nope.png"))
            .await
            .expect_err("missing image");
        assert!(matches!(err, ContentError::ImageNotFound(name) if name == "nope.png"));

        mock.fail_with(503);
        let err = preview_field(&generator, &uploads, FieldKind::Description, &rules, None)
            .await
            .expect_err("provider down");
        assert!(matches!(err, ContentError::Provider(ProviderError::Status { status: 503, .. })));
    }
}
