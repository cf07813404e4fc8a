use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use super::layout::TextBlock;

/// Outline drawn beneath bold text.
pub const STROKE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub fn stroke_width(font_size: u32) -> i32 {
    ((font_size as f32 * 0.08).round() as i32).max(1)
}

/// Source-over blend of `src` onto `dst`.
pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    Rgba(out)
}

/// Calls `cell` with the top-left corner of every lit glyph cell of `text`.
fn for_each_cell(x: i32, y: i32, text: &str, scale: i32, mut cell: impl FnMut(i32, i32)) {
    let mut cursor_x = x;
    for ch in text.chars() {
        if let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) {
            for (row_idx, row_bits) in glyph.iter().enumerate() {
                for col_idx in 0..8 {
                    if (row_bits >> col_idx) & 1 == 1 {
                        cell(cursor_x + col_idx * scale, y + row_idx as i32 * scale);
                    }
                }
            }
        }
        cursor_x += 8 * scale;
    }
}

pub fn draw_text_line(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>, scale: u32) {
    let scale = scale.max(1) as i32;
    let (width, height) = (img.width() as i32, img.height() as i32);
    if y >= height || y + 8 * scale <= 0 {
        return;
    }

    for_each_cell(x, y, text, scale, |px, py| {
        for ty in py.max(0)..(py + scale).min(height) {
            for tx in px.max(0)..(px + scale).min(width) {
                let dst = *img.get_pixel(tx as u32, ty as u32);
                img.put_pixel(tx as u32, ty as u32, blend_pixel(dst, color));
            }
        }
    });
}

/// Pixel region `[x0, x1) x [y0, y1)` with a row-major coverage mask.
struct Coverage {
    x0: i32,
    y0: i32,
    width: usize,
    height: usize,
    mask: Vec<bool>,
}

impl Coverage {
    fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let (width, height) = ((x1 - x0).max(0) as usize, (y1 - y0).max(0) as usize);
        Self { x0, y0, width, height, mask: vec![false; width * height] }
    }

    fn fill(&mut self, px: i32, py: i32, size: i32) {
        let cols = (px - self.x0).max(0)..(px + size - self.x0).min(self.width as i32);
        for row in (py - self.y0).max(0)..(py + size - self.y0).min(self.height as i32) {
            let offset = row as usize * self.width;
            for col in cols.clone() {
                self.mask[offset + col as usize] = true;
            }
        }
    }

    /// Grows the mask by a disc of `radius`: a pixel is set when some covered
    /// pixel lies within euclidean distance `radius`.
    fn dilate(&self, radius: i32) -> Vec<bool> {
        let (w, h) = (self.width, self.height);
        let mut nearest = vec![usize::MAX; w * h];

        for row in 0..h {
            let line = &self.mask[row * w..(row + 1) * w];
            let dist = &mut nearest[row * w..(row + 1) * w];
            let mut last = None;
            for col in 0..w {
                if line[col] {
                    last = Some(col);
                }
                if let Some(at) = last {
                    dist[col] = col - at;
                }
            }
            last = None;
            for col in (0..w).rev() {
                if line[col] {
                    last = Some(col);
                }
                if let Some(at) = last {
                    dist[col] = dist[col].min(at - col);
                }
            }
        }

        let reach: Vec<usize> = (-radius..=radius)
            .map(|dy| ((radius * radius - dy * dy) as f64).sqrt().floor() as usize)
            .collect();

        let mut out = vec![false; w * h];
        for row in 0..h {
            for col in 0..w {
                out[row * w + col] = (-radius..=radius).any(|dy| {
                    let src = row as i64 + dy as i64;
                    src >= 0
                        && (src as usize) < h
                        && nearest[src as usize * w + col] <= reach[(dy + radius) as usize]
                });
            }
        }
        out
    }
}

/// Dark outline around one line: glyph coverage dilated by `radius`.
fn draw_outline(img: &mut RgbaImage, x: i32, y: i32, text: &str, scale: u32, radius: i32) {
    let scale = scale.max(1) as i32;
    let (width, height) = (img.width() as i32, img.height() as i32);
    let text_width = text.chars().count() as i32 * 8 * scale;

    // glyphs up to `radius` outside the canvas still reach into it
    let x0 = (x - radius).max(-radius);
    let y0 = (y - radius).max(-radius);
    let x1 = (x + text_width + radius).min(width + radius);
    let y1 = (y + 8 * scale + radius).min(height + radius);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let mut coverage = Coverage::new(x0, y0, x1, y1);
    for_each_cell(x, y, text, scale, |px, py| coverage.fill(px, py, scale));
    let outline = coverage.dilate(radius);

    for row in 0..coverage.height {
        let ty = coverage.y0 + row as i32;
        if ty < 0 || ty >= height {
            continue;
        }
        for col in 0..coverage.width {
            let tx = coverage.x0 + col as i32;
            if tx >= 0 && tx < width && outline[row * coverage.width + col] {
                let dst = *img.get_pixel(tx as u32, ty as u32);
                img.put_pixel(tx as u32, ty as u32, blend_pixel(dst, STROKE_COLOR));
            }
        }
    }
}

/// Draws every line of `block`; bold text gets a dark outline first.
pub fn draw_block(img: &mut RgbaImage, block: &TextBlock, color: Rgba<u8>, bold: bool) {
    let scale = block.metrics.scale;
    let origins = block.line_origins();

    if bold {
        let radius = stroke_width(block.metrics.font_size);
        for (line, &(x, y)) in block.lines.iter().zip(&origins) {
            draw_outline(img, x, y, line, scale, radius);
        }
    }

    for (line, &(x, y)) in block.lines.iter().zip(&origins) {
        draw_text_line(img, x, y, line, color, scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::layout::layout_block;

    fn count_color(img: &RgbaImage, color: Rgba<u8>) -> usize {
        img.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn test_blend_over_transparent_keeps_source() {
        let out = blend_pixel(Rgba([0, 0, 0, 0]), Rgba([200, 100, 50, 128]));
        assert_eq!(out[0], 200);
        assert_eq!(out[3], 128);
        assert_eq!(blend_pixel(Rgba([1, 2, 3, 255]), Rgba([9, 9, 9, 255])), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_bold_draws_stroke_and_normal_does_not() {
        let white = Rgba([255, 255, 255, 255]);
        let background = Rgba([40, 90, 160, 255]);
        let block = layout_block("HI", 24, (200, 100), (50.0, 50.0));

        let mut normal = RgbaImage::from_pixel(200, 100, background);
        draw_block(&mut normal, &block, white, false);
        assert!(count_color(&normal, white) > 0);
        assert_eq!(count_color(&normal, STROKE_COLOR), 0);

        let mut bold = RgbaImage::from_pixel(200, 100, background);
        draw_block(&mut bold, &block, white, true);
        assert!(count_color(&bold, STROKE_COLOR) > 0);
        // fill is painted last, so it is never hidden by the outline
        assert_eq!(count_color(&bold, white), count_color(&normal, white));
    }

    /// Outline stamped by redrawing the line at every offset of the disc.
    fn outline_by_offsets(width: u32, height: u32, block: &TextBlock) -> RgbaImage {
        let mut img = RgbaImage::new(width, height);
        let radius = stroke_width(block.metrics.font_size);
        for (line, &(x, y)) in block.lines.iter().zip(&block.line_origins()) {
            for dx in -radius..=radius {
                for dy in -radius..=radius {
                    if dx * dx + dy * dy <= radius * radius {
                        draw_text_line(&mut img, x + dx, y + dy, line, STROKE_COLOR, block.metrics.scale);
                    }
                }
            }
        }
        img
    }

    #[test]
    fn test_outline_matches_disc_stamping() {
        let cases = [
            ("Hello\nworld", 24, (50.0, 50.0)),
            ("edge", 40, (5.0, 5.0)),
            ("wrap me across a few lines please", 16, (95.0, 60.0)),
        ];

        for (text, size, anchor) in cases {
            let block = layout_block(text, size, (160, 120), anchor);
            let expected = outline_by_offsets(160, 120, &block);

            let mut actual = RgbaImage::new(160, 120);
            let radius = stroke_width(size);
            for (line, &(x, y)) in block.lines.iter().zip(&block.line_origins()) {
                draw_outline(&mut actual, x, y, line, block.metrics.scale, radius);
            }

            assert_eq!(count_color(&actual, STROKE_COLOR), count_color(&expected, STROKE_COLOR), "{}", text);
            assert!(actual
                .pixels()
                .zip(expected.pixels())
                .all(|(a, e)| (*a == STROKE_COLOR) == (*e == STROKE_COLOR)));
        }
    }

    #[test]
    fn test_bold_max_size_long_text_renders_visible_lines_only() {
        let text = "shortform ".repeat(50);
        let block = layout_block(text.trim(), 256, (1080, 1920), (50.0, 50.0));
        assert!(block.lines.len() > 100);

        let mut img = RgbaImage::from_pixel(1080, 1920, Rgba([40, 90, 160, 255]));
        let started = std::time::Instant::now();
        draw_block(&mut img, &block, Rgba([255, 255, 255, 255]), true);

        assert!(count_color(&img, STROKE_COLOR) > 0);
        assert!(started.elapsed() < std::time::Duration::from_secs(3), "{:?}", started.elapsed());
    }

    #[test]
    fn test_text_outside_canvas_is_clipped() {
        let mut img = RgbaImage::new(10, 10);
        draw_text_line(&mut img, -100, -100, "clipped", Rgba([255, 0, 0, 255]), 2);
        assert_eq!(count_color(&img, Rgba([255, 0, 0, 255])), 0);
    }
}
