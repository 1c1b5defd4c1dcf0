use crate::credentials::Credential;

const DEFAULT_BASE_URL: &str = "https://api.printify.com/v1";

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Used when a request carries no key of its own.
    pub default_api_key: Option<Credential>,
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        Self {
            default_api_key: std::env::var("PRINTIFY_API_KEY")
                .ok()
                .and_then(Credential::new),
            ..Self::with_base_url(
                std::env::var("PRINTIFY_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            )
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_api_key: None,
        }
    }
}
