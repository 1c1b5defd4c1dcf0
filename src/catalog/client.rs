use crate::catalog::config::CatalogConfig;
use crate::catalog::models::{
    CreateProductRequest, CreatedEntity, ProductPage, ProductSummary, Shop, TemplateProduct,
    UploadImageRequest,
};
use crate::credentials::Credential;
use crate::http::build_client;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use urlencoding::encode;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl CatalogError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Thin wrapper over the catalog REST API. Every call is a single attempt.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            http: build_client(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_shops(&self, token: &Credential) -> Result<Vec<Shop>, CatalogError> {
        let url = format!("{}/shops.json", self.base_url);
        self.send_json(self.http.get(url), token).await
    }

    pub async fn list_products(
        &self,
        shop_id: &str,
        token: &Credential,
    ) -> Result<Vec<ProductSummary>, CatalogError> {
        let url = format!("{}/shops/{}/products.json", self.base_url, encode(shop_id));
        let page: ProductPage = self.send_json(self.http.get(url), token).await?;
        Ok(page.data)
    }

    pub async fn fetch_product(
        &self,
        shop_id: &str,
        product_id: &str,
        token: &Credential,
    ) -> Result<TemplateProduct, CatalogError> {
        let url = format!(
            "{}/shops/{}/products/{}.json",
            self.base_url,
            encode(shop_id),
            encode(product_id)
        );
        self.send_json(self.http.get(url), token).await
    }

    /// Uploads raw image bytes and returns the catalog's image id.
    pub async fn upload_image(
        &self,
        token: &Credential,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, CatalogError> {
        let url = format!("{}/uploads/images.json", self.base_url);
        let body = UploadImageRequest {
            file_name,
            contents: BASE64.encode(bytes),
        };
        debug!(
            target = "podbulk.catalog",
            file_name,
            size = bytes.len(),
            "uploading image"
        );
        let created: CreatedEntity = self.send_json(self.http.post(url).json(&body), token).await?;
        created
            .id_string()
            .ok_or_else(|| CatalogError::Decode("upload response missing id".into()))
    }

    /// Creates a listing and returns its id.
    pub async fn create_product(
        &self,
        shop_id: &str,
        token: &Credential,
        payload: &CreateProductRequest,
    ) -> Result<String, CatalogError> {
        let url = format!("{}/shops/{}/products.json", self.base_url, encode(shop_id));
        let created: CreatedEntity = self
            .send_json(self.http.post(url).json(payload), token)
            .await?;
        created
            .id_string()
            .ok_or_else(|| CatalogError::Decode("create response missing id".into()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &Credential,
    ) -> Result<T, CatalogError> {
        let response = request
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|err| CatalogError::Request(err.to_string()))?;
        let response = ensure_success(response).await.inspect_err(|err| {
            debug!(target = "podbulk.catalog", status = err.status(), "catalog rejected request")
        })?;
        response
            .json::<T>()
            .await
            .map_err(|err| CatalogError::Decode(err.to_string()))
    }
}

async fn ensure_success(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CatalogError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCatalog, spawn_router};
    use serde_json::json;

    async fn client_for(mock: &MockCatalog) -> CatalogClient {
        let base = spawn_router(mock.router()).await;
        CatalogClient::new(&CatalogConfig::with_base_url(base))
    }

    fn token() -> Credential {
        Credential::new("test-token").unwrap()
    }

    #[tokio::test]
    async fn lists_shops_and_products_with_bearer_token() {
        let mock = MockCatalog::new();
        let client = client_for(&mock).await;

        let shops = client.list_shops(&token()).await.expect("shops");
        assert_eq!(shops.len(), 1);
        assert_eq!(shops[0].name, "Demo Shop");

        let products = client.list_products("7", &token()).await.expect("products");
        assert_eq!(products[0].id, "tpl-1");

        let calls = mock.calls();
        assert!(calls.iter().all(|c| c.auth.as_deref() == Some("Bearer test-token")));
    }

    #[tokio::test]
    async fn upload_sends_base64_and_returns_id() {
        let mock = MockCatalog::new();
        let client = client_for(&mock).await;

        let id = client
            .upload_image(&token(), "a.png", b"hello")
            .await
            .expect("upload");
        assert_eq!(id, "img-1");

        let uploads = mock.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0]["file_name"], json!("a.png"));
        assert_eq!(uploads[0]["contents"], json!(BASE64.encode(b"hello")));
    }

    #[tokio::test]
    async fn non_success_status_carries_upstream_body() {
        let mock = MockCatalog::new();
        mock.fail_fetch(404, "{\"error\":\"not found\"}");
        let client = client_for(&mock).await;

        let err = client
            .fetch_product("7", "missing", &token())
            .await
            .expect_err("should fail");
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_request_error() {
        let client = CatalogClient::new(&CatalogConfig::with_base_url("http://127.0.0.1:9"));
        let err = client.list_shops(&token()).await.expect_err("no server");
        assert!(matches!(err, CatalogError::Request(_)));
    }
}
