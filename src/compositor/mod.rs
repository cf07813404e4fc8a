//! Flattens a variation image and its overlay text into a single PNG.
//!
//! Embedded `data:` images decode in place. Remote images are fetched first;
//! when that fails for any reason the text is rendered alone on a transparent
//! portrait canvas instead of failing the download.

pub mod layout;
pub mod raster;

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use std::{io::Cursor, time::Duration};
use tracing::{debug, warn};

use crate::{
    errors::{AppError, Result},
    models::Overlay,
    utils::file::decode_data_url,
};

pub use layout::{layout_block, wrap_lines, FontMetrics, TextBlock, MAX_LINE_WIDTH_FRACTION};

/// Canvas used when the base image cannot be loaded.
pub const FALLBACK_CANVAS: (u32, u32) = (1080, 1920);

const MAX_REMOTE_IMAGE_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug)]
pub struct Composite {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub used_fallback: bool,
}

#[derive(Clone)]
pub struct Compositor {
    http: reqwest::Client,
}

impl Compositor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn compose(&self, image_ref: &str, overlay: &Overlay) -> Result<Composite> {
        let (base, used_fallback) = match self.load_base_image(image_ref).await {
            Ok(image) => (image, false),
            Err(e) => {
                warn!("Base image unavailable, rendering text only: {}", e);
                if !has_visible_text(overlay) {
                    return Err(AppError::Compositing(
                        "The image could not be loaded and there is no text to render".to_string(),
                    ));
                }
                (RgbaImage::new(FALLBACK_CANVAS.0, FALLBACK_CANVAS.1), true)
            }
        };

        let overlay = overlay.clone();
        let composite = tokio::task::spawn_blocking(move || -> Result<Composite> {
            let (width, height) = base.dimensions();
            let flattened = render_overlay(base, &overlay)?;
            Ok(Composite {
                png: encode_png(flattened)?,
                width,
                height,
                used_fallback,
            })
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Compositor task failed: {}", e)))??;

        debug!(
            "Composited {}x{} image (fallback: {})",
            composite.width, composite.height, composite.used_fallback
        );
        Ok(composite)
    }

    pub async fn load_base_image(&self, image_ref: &str) -> Result<RgbaImage> {
        let bytes = if image_ref.starts_with("data:") {
            let (_, bytes) = decode_data_url(image_ref)?;
            bytes
        } else {
            self.fetch_remote(image_ref).await?
        };

        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|img| img.to_rgba8())
                .map_err(AppError::from)
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Image decode task failed: {}", e)))?
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(20))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Image host returned status {}",
                response.status()
            )));
        }

        if response.content_length().unwrap_or(0) as usize > MAX_REMOTE_IMAGE_BYTES {
            return Err(AppError::Upstream("Remote image is too large".to_string()));
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_REMOTE_IMAGE_BYTES {
            return Err(AppError::Upstream("Remote image is too large".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

fn has_visible_text(overlay: &Overlay) -> bool {
    overlay.visible && !overlay.text.trim().is_empty()
}

/// Draws `overlay` onto `base`. Hidden or blank overlays leave the image as is.
pub fn render_overlay(mut base: RgbaImage, overlay: &Overlay) -> Result<RgbaImage> {
    if !has_visible_text(overlay) {
        return Ok(base);
    }

    let color = overlay.color()?;
    let block = layout_block(
        &overlay.text,
        overlay.style.font_size,
        base.dimensions(),
        (overlay.x, overlay.y),
    );
    raster::draw_block(&mut base, &block, color, overlay.style.font_weight.is_bold());
    Ok(base)
}

pub fn encode_png(image: RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image).write_to(&mut buffer, ImageOutputFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FontWeight, Overlay};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::Rgba;

    fn png_data_url(width: u32, height: u32, color: Rgba<u8>) -> String {
        let png = encode_png(RgbaImage::from_pixel(width, height, color)).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(png))
    }

    #[tokio::test]
    async fn test_embedded_image_fast_path() {
        let compositor = Compositor::new(reqwest::Client::new());
        let mut overlay = Overlay::for_phrase("Hello");
        overlay.style.font_size = 16;
        overlay.style.font_weight = FontWeight::Normal;

        let composite = compositor
            .compose(&png_data_url(120, 80, Rgba([10, 20, 30, 255])), &overlay)
            .await
            .unwrap();

        assert!(!composite.used_fallback);
        assert_eq!((composite.width, composite.height), (120, 80));

        let decoded = image::load_from_memory(&composite.png).unwrap().to_rgba8();
        let white = decoded.pixels().filter(|p| **p == Rgba([255, 255, 255, 255])).count();
        assert!(white > 0);
    }

    #[tokio::test]
    async fn test_unreachable_image_falls_back_to_transparent_canvas() {
        let compositor = Compositor::new(reqwest::Client::new());
        let overlay = Overlay::for_phrase("Still here");

        let composite = compositor
            .compose("http://127.0.0.1:9/missing.png", &overlay)
            .await
            .unwrap();

        assert!(composite.used_fallback);
        assert_eq!((composite.width, composite.height), FALLBACK_CANVAS);

        let decoded = image::load_from_memory(&composite.png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert!(decoded.pixels().any(|p| p[3] == 255));
    }

    #[tokio::test]
    async fn test_fallback_without_text_is_an_error() {
        let compositor = Compositor::new(reqwest::Client::new());
        let mut overlay = Overlay::for_phrase("hidden");
        overlay.visible = false;

        let result = compositor.compose("data:image/png;base64,!!!", &overlay).await;
        assert!(matches!(result, Err(AppError::Compositing(_))));
    }

    #[test]
    fn test_hidden_overlay_leaves_image_untouched() {
        let base = RgbaImage::from_pixel(40, 40, Rgba([1, 2, 3, 255]));
        let mut overlay = Overlay::for_phrase("invisible");
        overlay.visible = false;

        let rendered = render_overlay(base.clone(), &overlay).unwrap();
        assert_eq!(rendered, base);
    }
}
