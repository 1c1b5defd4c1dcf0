use crate::provider::ProviderError;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::{ImageFormat, imageops::FilterType};
use std::io::Cursor;
use tracing::debug;

/// An image decoded, bounded and re-encoded as PNG, ready to be sent to a
/// provider.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    png: Vec<u8>,
}

impl PreparedImage {
    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.png)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.base64())
    }
}

/// Decodes `bytes`, shrinks it so the longest side is at most
/// `max_dimension` while keeping the aspect ratio, and re-encodes as PNG.
/// Smaller images are never upscaled.
pub fn prepare_image(bytes: &[u8], max_dimension: u32) -> Result<PreparedImage, ProviderError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| ProviderError::Image(err.to_string()))?;
    let bound = max_dimension.max(1);
    let resized = if decoded.width() > bound || decoded.height() > bound {
        decoded.resize(bound, bound, FilterType::Lanczos3)
    } else {
        decoded
    };
    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| ProviderError::Image(err.to_string()))?;
    Ok(PreparedImage {
        width: resized.width(),
        height: resized.height(),
        png: out.into_inner(),
    })
}

/// [`prepare_image`] on the blocking pool.
pub async fn prepare(bytes: &[u8], max_dimension: u32) -> Result<PreparedImage, ProviderError> {
    let owned = bytes.to_vec();
    let prepared = tokio::task::spawn_blocking(move || prepare_image(&owned, max_dimension))
        .await
        .map_err(|err| ProviderError::Image(err.to_string()))??;
    debug!(
        target = "podbulk.provider",
        width = prepared.width,
        height = prepared.height,
        "image prepared"
    );
    Ok(prepared)
}
