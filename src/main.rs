mod catalog;
mod content;
mod credentials;
mod http;
mod jobs;
mod metrics;
mod models;
mod pipeline;
mod provider;
mod uploads;

#[cfg(test)]
mod testing;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use catalog::{CatalogError, ProductSummary, Shop, TemplateProduct};
use content::{ContentError, FieldValue, preview_field, preview_generator};
use credentials::{Credential, bearer_token};
use eyre::WrapErr;
use jobs::{JobController, JobError, JobQueue, JobSnapshot};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{
    ApiError, CreateProductsRequest, CreationStarted, GenerateRequest, MessageResponse,
    ProductDetailsQuery, ProductsQuery,
};
use pipeline::{BulkJob, Pipeline};
use provider::{FieldKind, OllamaProvider, ProviderError};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "podbulk.api", "server crashed: {err:?}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let pipeline = Pipeline::from_env();
    let (queue, _worker) = JobQueue::spawn(pipeline.clone(), JobController::new());
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("failed to install prometheus recorder")?;
    info!(
        target = "podbulk.api",
        uploads = %pipeline.uploads().root().display(),
        "upload area ready"
    );

    let app = build_app(AppState {
        pipeline,
        queue,
        prometheus_handle,
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "podbulk.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    queue: JobQueue,
    prometheus_handle: PrometheusHandle,
}

fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let api = Router::new()
        .route("/create_products", post(create_products))
        .route("/progress", get(progress))
        .route("/cancel", post(cancel))
        .route("/generate_title", post(generate_title))
        .route("/generate_description", post(generate_description))
        .route("/generate_tags", post(generate_tags))
        .route("/stores", get(stores))
        .route("/products", get(products))
        .route("/product_details", get(product_details))
        .route("/ollama_models", get(ollama_models));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit_from_env()))
}

/// Health check. `GET /health`, no auth.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "podbulk-api-rs",
    }))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Queue a bulk creation job.
///
/// - Method: `POST`
/// - Path: `/api/create_products`
/// - Body: `CreateProductsRequest`
/// - Response: `{message, job_id}`; `409` while another job is in flight
///
/// The catalog key may be sent as `api_key` or as a bearer token. A missing
/// key is reported through `/api/progress`, not here.
async fn create_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProductsRequest>,
) -> Result<Json<CreationStarted>, AppError> {
    metrics::inc_requests("/api/create_products");
    let job = BulkJob {
        rules: payload.rules(),
        credentials: payload.provider_credentials(),
        catalog_key: payload.catalog_key().or_else(|| bearer_token(&headers)),
        images: payload.images,
        placement_mode: payload.placement_mode,
        shop_id: payload.store_id,
        template_product_id: payload.product_id,
    };
    let total = job.images.len();
    let job_id = state.queue.submit(job).await?;
    info!(target = "podbulk.api", %job_id, images = total, "creation accepted");
    Ok(Json(CreationStarted {
        message: "Creation started",
        job_id,
    }))
}

async fn progress(State(state): State<AppState>) -> Json<JobSnapshot> {
    Json(state.queue.snapshot().await)
}

async fn cancel(State(state): State<AppState>) -> Json<MessageResponse> {
    metrics::inc_requests("/api/cancel");
    state.queue.cancel();
    Json(MessageResponse {
        message: "Operation cancelled",
    })
}

async fn generate_title(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/api/generate_title");
    let title = generate_one(&state, FieldKind::Title, &payload).await?;
    Ok(Json(json!({ "title": title })))
}

async fn generate_description(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/api/generate_description");
    let description = generate_one(&state, FieldKind::Description, &payload).await?;
    Ok(Json(json!({ "description": description })))
}

async fn generate_tags(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/api/generate_tags");
    let tags = generate_one(&state, FieldKind::Tags, &payload).await?;
    Ok(Json(json!({ "tags": tags })))
}

async fn generate_one(
    state: &AppState,
    field: FieldKind,
    payload: &GenerateRequest,
) -> Result<FieldValue, AppError> {
    let uploads = state.pipeline.uploads();
    let generator = preview_generator(
        payload.provider,
        &payload.credentials(),
        payload.ollama_model.as_deref(),
        state.pipeline.provider_config(),
        uploads.clone(),
    )?;
    let value = preview_field(
        &generator,
        uploads,
        field,
        &payload.rules(),
        payload.image_path.as_deref(),
    )
    .await?;
    Ok(value)
}

async fn stores(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Shop>>, AppError> {
    metrics::inc_requests("/api/stores");
    let token = catalog_token(&state, &headers)?;
    Ok(Json(state.pipeline.catalog().list_shops(&token).await?))
}

async fn products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<ProductSummary>>, AppError> {
    metrics::inc_requests("/api/products");
    let token = catalog_token(&state, &headers)?;
    let products = state
        .pipeline
        .catalog()
        .list_products(&query.store_id, &token)
        .await?;
    Ok(Json(products))
}

async fn product_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ProductDetailsQuery>,
) -> Result<Json<TemplateProduct>, AppError> {
    metrics::inc_requests("/api/product_details");
    let token = catalog_token(&state, &headers)?;
    let product = state
        .pipeline
        .catalog()
        .fetch_product(&query.store_id, &query.product_id, &token)
        .await?;
    Ok(Json(product))
}

async fn ollama_models(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let config = state.pipeline.provider_config();
    let ollama = OllamaProvider::new(config, &config.ollama_model);
    let models = ollama.list_models().await.map_err(AppError::Provider)?;
    Ok(Json(models))
}

fn catalog_token(state: &AppState, headers: &HeaderMap) -> Result<Credential, AppError> {
    state
        .pipeline
        .catalog_key(bearer_token(headers))
        .ok_or(AppError::MissingCredential("Printify API key required"))
}

#[derive(Debug)]
enum AppError {
    Job(JobError),
    Content(ContentError),
    Catalog(CatalogError),
    Provider(ProviderError),
    MissingCredential(&'static str),
}

impl From<JobError> for AppError {
    fn from(value: JobError) -> Self {
        Self::Job(value)
    }
}

impl From<ContentError> for AppError {
    fn from(value: ContentError) -> Self {
        Self::Content(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match &self {
            AppError::Job(JobError::Busy) => (StatusCode::CONFLICT, "job_busy", self.detail()),
            AppError::Job(JobError::WorkerUnavailable) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "worker_unavailable",
                self.detail(),
            ),
            AppError::Content(ContentError::ProviderUnavailable(_)) => (
                StatusCode::BAD_REQUEST,
                "provider_unavailable",
                self.detail(),
            ),
            AppError::Content(ContentError::ImageNotFound(_)) => {
                (StatusCode::NOT_FOUND, "image_not_found", self.detail())
            }
            AppError::Content(ContentError::Provider(_)) => {
                (StatusCode::BAD_GATEWAY, "generation_failed", self.detail())
            }
            AppError::Catalog(CatalogError::Status { status, body }) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                "catalog_error",
                body.clone(),
            ),
            AppError::Catalog(_) => (StatusCode::BAD_GATEWAY, "catalog_unreachable", self.detail()),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error", self.detail()),
            AppError::MissingCredential(_) => {
                (StatusCode::BAD_REQUEST, "missing_credential", self.detail())
            }
        };
        if status.is_server_error() {
            error!(target = "podbulk.api", code, %detail, "request failed");
        }
        (status, Json(ApiError::new(code, Some(detail)))).into_response()
    }
}

impl AppError {
    fn detail(&self) -> String {
        match self {
            AppError::Job(err) => err.to_string(),
            AppError::Content(err) => err.to_string(),
            AppError::Catalog(err) => err.to_string(),
            AppError::Provider(err) => err.to_string(),
            AppError::MissingCredential(message) => message.to_string(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
