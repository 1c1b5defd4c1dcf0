pub mod client;
pub mod config;
pub mod models;

pub use client::{CatalogClient, CatalogError};
pub use config::CatalogConfig;
pub use models::{CreateProductRequest, ProductSummary, Shop, TemplateProduct};
