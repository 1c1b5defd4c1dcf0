use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{DefaultOnNull, serde_as, skip_serializing_none};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: u64,
    /// The catalog calls it `title`; the store picker reads `name`.
    #[serde(rename(serialize = "name", deserialize = "title"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductPage {
    #[serde(default)]
    pub data: Vec<ProductSummary>,
}

/// The reference listing whose structure every generated listing reuses.
/// Missing and `null` attributes both read as empty.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateProduct {
    #[serde(default)]
    pub id: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub title: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub description: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub variants: Vec<Value>,
    #[serde(default)]
    pub print_provider_id: Option<u64>,
    #[serde(default)]
    pub blueprint_id: Option<u64>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub print_areas: Vec<PrintArea>,
}

impl TemplateProduct {
    /// Copy of the print-area tree with `image_id` placed, centered and
    /// unscaled, into every placeholder. The template itself is untouched.
    pub fn print_areas_with_image(&self, image_id: &str) -> Vec<PrintArea> {
        self.print_areas
            .iter()
            .cloned()
            .map(|mut area| {
                for placeholder in &mut area.placeholders {
                    placeholder.images = vec![PlacedImage::centered(image_id)];
                }
                area
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrintArea {
    #[serde(default)]
    pub placeholders: Vec<Placeholder>,
    /// Fields such as `variant_ids` and `background` are passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Placeholder {
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub images: Vec<PlacedImage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacedImage {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub scale: f64,
    #[serde(default)]
    pub angle: f64,
}

impl PlacedImage {
    pub fn centered(id: &str) -> Self {
        Self {
            id: id.to_string(),
            x: 0.5,
            y: 0.5,
            scale: 1.0,
            angle: 0.0,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub variants: Vec<Value>,
    pub print_provider_id: Option<u64>,
    pub blueprint_id: Option<u64>,
    pub print_areas: Vec<PrintArea>,
}

impl CreateProductRequest {
    pub fn from_template(
        template: &TemplateProduct,
        image_id: &str,
        title: String,
        description: String,
        tags: Vec<String>,
    ) -> Self {
        Self {
            title,
            description,
            tags,
            variants: template.variants.clone(),
            print_provider_id: template.print_provider_id,
            blueprint_id: template.blueprint_id,
            print_areas: template.print_areas_with_image(image_id),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadImageRequest<'a> {
    pub file_name: &'a str,
    pub contents: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedEntity {
    pub id: Value,
}

impl CreatedEntity {
    /// Ids arrive as strings from some endpoints and as numbers from others.
    pub fn id_string(&self) -> Option<String> {
        match &self.id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
