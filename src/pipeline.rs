use crate::catalog::{CatalogClient, CatalogConfig, CatalogError, CreateProductRequest};
use crate::content::{ContentGenerator, Rules};
use crate::credentials::Credential;
use crate::jobs::{FinalStatus, JobController};
use crate::metrics;
use crate::provider::{ProviderConfig, ProviderCredentials, select_provider};
use crate::uploads::{UploadArea, UploadError, secure_filename};
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{info, warn};

/// One bulk-creation request as accepted by the API.
#[derive(Debug, Clone)]
pub struct BulkJob {
    pub images: Vec<String>,
    pub placement_mode: String,
    pub shop_id: String,
    pub template_product_id: String,
    pub catalog_key: Option<Credential>,
    pub rules: Rules,
    pub credentials: ProviderCredentials,
}

#[derive(Debug)]
pub enum JobOutcome {
    Completed { created: Vec<String> },
    /// `processed` images were fully created before the cancel was seen.
    Cancelled { processed: usize },
    Failed(PipelineError),
}

#[derive(Clone)]
pub struct Pipeline {
    catalog: CatalogClient,
    uploads: UploadArea,
    providers: Arc<ProviderConfig>,
    default_catalog_key: Option<Credential>,
}

impl Pipeline {
    pub fn new(catalog: &CatalogConfig, providers: ProviderConfig, uploads: UploadArea) -> Self {
        Self {
            catalog: CatalogClient::new(catalog),
            uploads,
            providers: Arc::new(providers),
            default_catalog_key: catalog.default_api_key.clone(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            &CatalogConfig::from_env(),
            ProviderConfig::from_env(),
            UploadArea::from_env(),
        )
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub fn uploads(&self) -> &UploadArea {
        &self.uploads
    }

    pub fn provider_config(&self) -> &ProviderConfig {
        &self.providers
    }

    /// Key sent with the request, else the configured default.
    pub fn catalog_key(&self, supplied: Option<Credential>) -> Option<Credential> {
        supplied.or_else(|| self.default_catalog_key.clone())
    }

    /// Runs a job to its end and records the result in `jobs`. Images are
    /// handled one at a time in submission order; the first catalog or
    /// file failure stops the batch and already-created listings stay.
    pub async fn run(&self, job: BulkJob, jobs: &JobController) -> JobOutcome {
        match self.execute(job, jobs).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(target = "podbulk.pipeline", stage = err.stage(), kind = ?err.kind(), error = %err.detail(), "job failed");
                jobs.finish(FinalStatus::Error, err.detail()).await;
                JobOutcome::Failed(err)
            }
        }
    }

    async fn execute(&self, job: BulkJob, jobs: &JobController) -> Result<JobOutcome, PipelineError> {
        let token = self
            .catalog_key(job.catalog_key.clone())
            .ok_or_else(|| PipelineError::config("credentials", "Printify API key required"))?;

        jobs.note("Fetching template product...").await;
        let template = self
            .catalog
            .fetch_product(&job.shop_id, &job.template_product_id, &token)
            .await
            .map_err(|err| {
                PipelineError::upstream(
                    "fetch_template",
                    format!("Failed to fetch template product: {}", upstream_detail(&err)),
                )
            })?;

        let rules = job.rules.clone().with_template(&template);
        let provider = select_provider(
            rules.provider,
            &job.credentials,
            rules.ollama_model.as_deref(),
            &self.providers,
        );
        if rules.uses_ai() && !provider.is_enabled() {
            warn!(
                target = "podbulk.pipeline",
                requested = rules.provider.as_str(),
                "no usable AI provider, AI fields use template content"
            );
        }
        let generator = ContentGenerator::new(provider, self.uploads.clone());

        let total = job.images.len();
        jobs.start(total)
            .await
            .map_err(|err| PipelineError::config("start", err.to_string()))?;
        info!(
            target = "podbulk.pipeline",
            shop_id = %job.shop_id,
            template = %job.template_product_id,
            placement_mode = %job.placement_mode,
            provider = generator.provider_name(),
            total,
            "bulk creation started"
        );

        let mut created = Vec::with_capacity(total);
        for (index, image) in job.images.iter().enumerate() {
            if jobs.is_cancel_requested() {
                jobs.finish(FinalStatus::Cancelled, "Operation cancelled by user")
                    .await;
                return Ok(JobOutcome::Cancelled { processed: index });
            }
            let position = index + 1;
            jobs.advance(position, format!("Processing image {position}/{total}: {image}"))
                .await;
            let started = Instant::now();

            let name = secure_filename(image);
            if !self.uploads.exists(image).await {
                return Err(PipelineError::local_io(
                    "read_image",
                    format!("File not found: {name}"),
                ));
            }
            let bytes = self.uploads.read(image).await.map_err(|err| match err {
                UploadError::NotFound(name) | UploadError::InvalidName(name) => {
                    PipelineError::local_io("read_image", format!("File not found: {name}"))
                }
                other => PipelineError::local_io("read_image", other.to_string()),
            })?;

            jobs.note(format!("Uploading {name} to Printify...")).await;
            let image_id = self
                .catalog
                .upload_image(&token, &name, &bytes)
                .await
                .map_err(|err| {
                    PipelineError::upstream(
                        "upload_image",
                        format!("Failed to upload {image}: {}", upstream_detail(&err)),
                    )
                })?;

            jobs.note(format!(
                "Generating content for {name} using {}...",
                generator.provider_name()
            ))
            .await;
            let content = generator.generate(&rules, &name).await;
            info!(target = "podbulk.pipeline", image = %name, title = %content.title, tags = content.tags.len(), "content generated");

            let payload = CreateProductRequest::from_template(
                &template,
                &image_id,
                content.title,
                content.description,
                content.tags,
            );
            jobs.note(format!("Creating product for {name}...")).await;
            let product_id = self
                .catalog
                .create_product(&job.shop_id, &token, &payload)
                .await
                .map_err(|err| {
                    PipelineError::upstream(
                        "create_product",
                        format!("Failed to create product for {image}: {}", upstream_detail(&err)),
                    )
                })?;

            let elapsed = started.elapsed().as_millis();
            metrics::listing_created(elapsed);
            info!(target = "podbulk.pipeline", image = %name, product_id = %product_id, elapsed_ms = elapsed as u64, "listing created");
            jobs.note(format!("Successfully created product ID: {product_id}"))
                .await;
            created.push(product_id);
        }

        jobs.finish(FinalStatus::Completed, "All products created successfully!")
            .await;
        Ok(JobOutcome::Completed { created })
    }
}

fn upstream_detail(err: &CatalogError) -> String {
    match err {
        CatalogError::Status { status, body } if body.trim().is_empty() => format!("HTTP {status}"),
        CatalogError::Status { status, body } => format!("HTTP {status}: {}", body.trim()),
        other => other.to_string(),
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// Missing credential or an unusable job.
    Config,
    /// The catalog refused or could not be reached.
    Upstream,
    LocalIo,
}

impl PipelineError {
    pub fn config(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::Config)
    }

    pub fn upstream(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::Upstream)
    }

    pub fn local_io(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, PipelineErrorKind::LocalIo)
    }

    fn new(stage: &'static str, message: impl Into<String>, kind: PipelineErrorKind) -> Self {
        Self {
            stage,
            message: message.into(),
            kind,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}
