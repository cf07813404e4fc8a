//! Line breaking and block placement for overlay text.
//!
//! Explicit line breaks are kept verbatim. Otherwise words are packed greedily
//! into lines no wider than [`MAX_LINE_WIDTH_FRACTION`] of the canvas, and the
//! resulting block is centered on the anchor point.

/// Widest a wrapped line may be, as a fraction of canvas width.
pub const MAX_LINE_WIDTH_FRACTION: f32 = 0.75;
/// Line height relative to font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

const GLYPH_CELL: u32 = 8;

/// Metrics of the built-in 8x8 face scaled to a requested font size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub font_size: u32,
    pub scale: u32,
}

impl FontMetrics {
    pub fn for_size(font_size: u32) -> Self {
        let scale = ((font_size as f32) / GLYPH_CELL as f32).round().max(1.0) as u32;
        Self { font_size, scale }
    }

    pub fn glyph_width(&self) -> u32 {
        GLYPH_CELL * self.scale
    }

    pub fn glyph_height(&self) -> u32 {
        GLYPH_CELL * self.scale
    }

    pub fn line_height(&self) -> u32 {
        let nominal = (self.font_size as f32 * LINE_HEIGHT_FACTOR).round() as u32;
        nominal.max(self.glyph_height())
    }

    pub fn measure(&self, text: &str) -> u32 {
        text.chars().count() as u32 * self.glyph_width()
    }
}

/// Lines positioned on a canvas, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub metrics: FontMetrics,
    pub center_x: i32,
    pub top: i32,
}

impl TextBlock {
    pub fn height(&self) -> u32 {
        self.lines.len() as u32 * self.metrics.line_height()
    }

    /// Top-left pixel of each line, glyphs vertically centered in their line box.
    pub fn line_origins(&self) -> Vec<(i32, i32)> {
        let line_height = self.metrics.line_height() as i32;
        let inset = (line_height - self.metrics.glyph_height() as i32) / 2;

        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let width = self.metrics.measure(line) as i32;
                (self.center_x - width / 2, self.top + i as i32 * line_height + inset)
            })
            .collect()
    }
}

pub fn max_line_width(canvas_width: u32) -> u32 {
    (canvas_width as f32 * MAX_LINE_WIDTH_FRACTION).floor() as u32
}

pub fn wrap_lines(text: &str, metrics: &FontMetrics, max_width: u32) -> Vec<String> {
    if text.contains('\n') {
        return text
            .split('\n')
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
    }

    let max_chars = (max_width / metrics.glyph_width()).max(1) as usize;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if metrics.measure(word) > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_chars).peekable();
            while let Some(chunk) = chunks.next() {
                let piece: String = chunk.iter().collect();
                if chunks.peek().is_some() {
                    lines.push(piece);
                } else {
                    current = piece;
                }
            }
            continue;
        }

        if current.is_empty() {
            current = word.to_string();
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if metrics.measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Lays out `text` with its block centered on the anchor (percent of canvas size).
pub fn layout_block(
    text: &str,
    font_size: u32,
    canvas: (u32, u32),
    anchor_pct: (f64, f64),
) -> TextBlock {
    let (width, height) = canvas;
    let metrics = FontMetrics::for_size(font_size);
    let lines = wrap_lines(text, &metrics, max_line_width(width));

    let center_x = (width as f64 * anchor_pct.0 / 100.0).round() as i32;
    let center_y = (height as f64 * anchor_pct.1 / 100.0).round() as i32;
    let block_height = lines.len() as i32 * metrics.line_height() as i32;

    TextBlock {
        lines,
        metrics,
        center_x,
        top: center_y - block_height / 2,
    }
}
