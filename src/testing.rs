//! In-process mock servers for the catalog and the local model endpoint.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    format!("http://{addr}")
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub auth: Option<String>,
}

type CreateHook = Arc<dyn Fn(usize) + Send + Sync>;

struct CatalogState {
    calls: Vec<RecordedCall>,
    uploads: Vec<Value>,
    created: Vec<Value>,
    template: Value,
    fetch_failure: Option<(u16, String)>,
    upload_failure: Option<(u16, String)>,
    create_failure_at: Option<usize>,
    on_create: Option<CreateHook>,
}

#[derive(Clone)]
pub struct MockCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::with_template(json!({
            "id": "tpl-1",
            "title": "T",
            "description": "D",
            "tags": ["x"],
            "variants": [{"id": 101, "price": 2500, "is_enabled": true}],
            "print_provider_id": 29,
            "blueprint_id": 6,
            "print_areas": [
                {"variant_ids": [101], "placeholders": [{"position": "front", "images": []}]}
            ]
        }))
    }

    pub fn with_template(template: Value) -> Self {
        Self {
            state: Arc::new(Mutex::new(CatalogState {
                calls: Vec::new(),
                uploads: Vec::new(),
                created: Vec::new(),
                template,
                fetch_failure: None,
                upload_failure: None,
                create_failure_at: None,
                on_create: None,
            })),
        }
    }

    pub fn fail_fetch(&self, status: u16, body: &str) {
        self.state.lock().unwrap().fetch_failure = Some((status, body.to_string()));
    }

    pub fn fail_upload(&self, status: u16, body: &str) {
        self.state.lock().unwrap().upload_failure = Some((status, body.to_string()));
    }

    /// The `n`-th create call (1-based) answers 500.
    pub fn fail_create_at(&self, n: usize) {
        self.state.lock().unwrap().create_failure_at = Some(n);
    }

    /// Runs after each successful create with the running create count.
    pub fn on_create(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.state.lock().unwrap().on_create = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn uploads(&self) -> Vec<Value> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn created(&self) -> Vec<Value> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/shops.json", get(shops))
            .route("/shops/{shop_id}/products.json", get(products).post(create))
            .route("/shops/{shop_id}/products/{product_file}", get(fetch))
            .route("/uploads/images.json", post(upload))
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone())
    }
}

async fn record(State(mock): State<MockCatalog>, request: Request<Body>, next: Next) -> Response {
    let call = RecordedCall {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        auth: request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    mock.state.lock().unwrap().calls.push(call);
    next.run(request).await
}

async fn shops() -> Json<Value> {
    Json(json!([{"id": 7, "title": "Demo Shop", "sales_channel": "etsy"}]))
}

async fn products() -> Json<Value> {
    Json(json!({"current_page": 1, "data": [{"id": "tpl-1", "title": "T"}]}))
}

async fn fetch(State(mock): State<MockCatalog>, Path((_shop, _file)): Path<(String, String)>) -> Response {
    let state = mock.state.lock().unwrap();
    if let Some((status, body)) = &state.fetch_failure {
        return failure(*status, body.clone());
    }
    Json(state.template.clone()).into_response()
}

async fn upload(State(mock): State<MockCatalog>, Json(body): Json<Value>) -> Response {
    let mut state = mock.state.lock().unwrap();
    if let Some((status, text)) = &state.upload_failure {
        return failure(*status, text.clone());
    }
    state.uploads.push(body);
    let id = format!("img-{}", state.uploads.len());
    Json(json!({"id": id})).into_response()
}

async fn create(State(mock): State<MockCatalog>, Json(body): Json<Value>) -> Response {
    let (count, hook) = {
        let mut state = mock.state.lock().unwrap();
        let attempt = state.created.len() + 1;
        if state.create_failure_at == Some(attempt) {
            return failure(500, "{\"error\":\"create failed\"}".into());
        }
        state.created.push(body);
        (state.created.len(), state.on_create.clone())
    };
    if let Some(hook) = hook {
        hook(count);
    }
    Json(json!({"id": format!("prod-{count}")})).into_response()
}

fn failure(status: u16, body: String) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, body).into_response()
}

struct OllamaState {
    prompts: Vec<String>,
    images: Vec<String>,
    models: Vec<String>,
    replies: Vec<(String, String)>,
    status: u16,
}

/// Answers `/api/generate` with the reply whose needle occurs in the prompt.
#[derive(Clone)]
pub struct MockOllama {
    state: Arc<Mutex<OllamaState>>,
}

impl MockOllama {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(OllamaState {
                prompts: Vec::new(),
                images: Vec::new(),
                models: vec!["llava:latest".into(), "bakllava:7b".into()],
                replies: Vec::new(),
                status: 200,
            })),
        }
    }

    pub fn reply_when(&self, needle: &str, reply: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .replies
            .push((needle.to_string(), reply.to_string()));
        self
    }

    pub fn fail_with(&self, status: u16) {
        self.state.lock().unwrap().status = status;
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.state.lock().unwrap().images.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/generate", post(ollama_generate))
            .route("/api/tags", get(ollama_tags))
            .with_state(self.clone())
    }
}

async fn ollama_generate(State(mock): State<MockOllama>, Json(body): Json<Value>) -> Response {
    let mut state = mock.state.lock().unwrap();
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    if body["stream"] != json!(false) {
        return failure(400, "stream must be false".into());
    }
    if let Some(images) = body["images"].as_array() {
        state
            .images
            .extend(images.iter().filter_map(|i| i.as_str().map(str::to_string)));
    }
    state.prompts.push(prompt.clone());
    if state.status != 200 {
        return failure(state.status, "model crashed".into());
    }
    let reply = state
        .replies
        .iter()
        .find(|(needle, _)| prompt.contains(needle.as_str()))
        .map(|(_, reply)| reply.clone())
        .unwrap_or_default();
    Json(json!({"model": body["model"], "response": reply, "done": true})).into_response()
}

async fn ollama_tags(State(mock): State<MockOllama>) -> Json<Value> {
    let state = mock.state.lock().unwrap();
    let models: Vec<Value> = state.models.iter().map(|name| json!({"name": name})).collect();
    Json(json!({"models": models}))
}
