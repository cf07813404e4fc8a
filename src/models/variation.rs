use chrono::{DateTime, Utc};
use image::Rgba;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, Result};

/// Interactive dragging keeps the anchor inside this band, in percent of the canvas.
pub const POSITION_MIN: f64 = 5.0;
pub const POSITION_MAX: f64 = 95.0;

pub const MIN_FONT_SIZE: u32 = 8;
pub const MAX_FONT_SIZE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

impl FontWeight {
    pub fn is_bold(self) -> bool {
        matches!(self, FontWeight::Bold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: FontWeight,
    /// Normalized to `#rrggbb`.
    pub color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: 48,
            font_weight: FontWeight::Bold,
            color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Overlay {
    pub text: String,
    /// Anchor x, percent of canvas width.
    pub x: f64,
    /// Anchor y, percent of canvas height.
    pub y: f64,
    pub style: TextStyle,
    pub visible: bool,
}

impl Overlay {
    pub fn for_phrase(phrase: &str) -> Self {
        Self {
            text: phrase.to_string(),
            x: 50.0,
            y: 50.0,
            style: TextStyle::default(),
            visible: true,
        }
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        if !x.is_finite() || !y.is_finite() {
            return Err(AppError::Validation("Position must be a finite number".to_string()));
        }
        self.x = clamp_position(x);
        self.y = clamp_position(y);
        Ok(())
    }

    pub fn color(&self) -> Result<Rgba<u8>> {
        parse_color(&self.style.color)
    }
}

pub fn clamp_position(value: f64) -> f64 {
    value.clamp(POSITION_MIN, POSITION_MAX)
}

/// JSON body for a generation. `image` is base64 or a data URL.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerateVariationsRequest {
    pub prompt: String,
    pub image: Option<String>,
}

pub const MAX_PROMPT_CHARS: usize = 1000;

/// Partial edit from the overlay editor. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VariationUpdate {
    pub text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub font_family: Option<String>,
    pub font_size: Option<u32>,
    pub font_weight: Option<FontWeight>,
    pub color: Option<String>,
    pub visible: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Variation {
    pub id: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub index: i32,
    /// Remote URL or a `data:` URL with the encoded image.
    pub image: String,
    pub phrase: String,
    pub overlay: Overlay,
    pub original: Overlay,
    pub created_at: DateTime<Utc>,
}

impl Variation {
    pub fn new(owner_id: Uuid, index: i32, image: String, phrase: String) -> Self {
        let overlay = Overlay::for_phrase(&phrase);
        Self {
            id: Uuid::new_v4(),
            owner_id,
            index,
            image,
            phrase,
            original: overlay.clone(),
            overlay,
            created_at: Utc::now(),
        }
    }

    /// Validates the whole edit before touching the overlay.
    pub fn apply(&mut self, update: VariationUpdate) -> Result<()> {
        let mut next = self.overlay.clone();

        if let Some(text) = update.text {
            if text.chars().count() > 500 {
                return Err(AppError::Validation("Overlay text is limited to 500 characters".to_string()));
            }
            next.text = text;
        }

        if update.x.is_some() || update.y.is_some() {
            let x = update.x.unwrap_or(next.x);
            let y = update.y.unwrap_or(next.y);
            next.move_to(x, y)?;
        }

        if let Some(family) = update.font_family {
            let family = family.trim();
            if family.is_empty() || family.len() > 64 {
                return Err(AppError::Validation("Font family must be 1-64 characters".to_string()));
            }
            next.style.font_family = family.to_string();
        }

        if let Some(size) = update.font_size {
            if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
                return Err(AppError::Validation(format!(
                    "Font size must be between {} and {}",
                    MIN_FONT_SIZE, MAX_FONT_SIZE
                )));
            }
            next.style.font_size = size;
        }

        if let Some(weight) = update.font_weight {
            next.style.font_weight = weight;
        }

        if let Some(color) = update.color {
            let rgba = parse_color(&color)?;
            next.style.color = format!("#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2]);
        }

        if let Some(visible) = update.visible {
            next.visible = visible;
        }

        self.overlay = next;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.overlay = self.original.clone();
    }
}

/// Accepts `#rgb`, `#rrggbb` and a handful of CSS color names.
pub fn parse_color(input: &str) -> Result<Rgba<u8>> {
    let value = input.trim().to_lowercase();
    let named = match value.as_str() {
        "white" => Some([255, 255, 255]),
        "black" => Some([0, 0, 0]),
        "red" => Some([255, 0, 0]),
        "yellow" => Some([255, 255, 0]),
        "blue" => Some([0, 0, 255]),
        "green" => Some([0, 128, 0]),
        "orange" => Some([255, 165, 0]),
        "pink" => Some([255, 192, 203]),
        _ => None,
    };
    if let Some([r, g, b]) = named {
        return Ok(Rgba([r, g, b, 255]));
    }

    let invalid = || AppError::Validation(format!("Invalid color: {}", input));
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variation() -> Variation {
        Variation::new(Uuid::new_v4(), 0, "https://cdn.example/a.png".to_string(), "Hello world".to_string())
    }

    #[test]
    fn test_drag_is_clamped() {
        let mut v = variation();
        v.apply(VariationUpdate { x: Some(-20.0), y: Some(140.0), ..Default::default() })
            .unwrap();
        assert_eq!(v.overlay.x, POSITION_MIN);
        assert_eq!(v.overlay.y, POSITION_MAX);

        v.apply(VariationUpdate { x: Some(33.5), ..Default::default() }).unwrap();
        assert_eq!(v.overlay.x, 33.5);
        assert_eq!(v.overlay.y, POSITION_MAX);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let mut v = variation();
        assert!(v.apply(VariationUpdate { x: Some(f64::NAN), ..Default::default() }).is_err());
        assert_eq!(v.overlay.x, 50.0);
    }

    #[test]
    fn test_failed_update_leaves_overlay_untouched() {
        let mut v = variation();
        let update = VariationUpdate {
            text: Some("changed".to_string()),
            color: Some("#zzzzzz".to_string()),
            ..Default::default()
        };
        assert!(v.apply(update).is_err());
        assert_eq!(v.overlay.text, "Hello world");
    }

    #[test]
    fn test_reset_restores_original() {
        let mut v = variation();
        v.apply(VariationUpdate {
            text: Some("Edited".to_string()),
            font_size: Some(72),
            font_weight: Some(FontWeight::Normal),
            color: Some("#F0A".to_string()),
            visible: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(v.overlay.style.color, "#ff00aa");
        assert!(!v.overlay.visible);

        v.reset();
        assert_eq!(v.overlay, v.original);
        assert_eq!(v.overlay.text, "Hello world");
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ffffff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#000").unwrap(), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_color("Yellow").unwrap(), Rgba([255, 255, 0, 255]));
        assert!(parse_color("ffffff").is_err());
        assert!(parse_color("#12345").is_err());
    }
}
