//! # Font Loading and Text Drawing
//!
//! Loads the first available TrueType font from the configured search paths
//! and rasterizes text straight onto the drawing surface with fontdue. When
//! no font file exists (common on dev machines and in CI) text falls back to
//! the embedded-graphics mono fonts so every renderer still produces output.

use crate::surface::Surface;
use embedded_graphics::{
    mono_font::{ascii, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::Point,
    text::{Baseline, Text},
    Drawable,
};
use fontdue::{Font, FontSettings};
use log::{debug, info};
use std::fs;

/// Minimum glyph coverage treated as ink on a 1-bit panel.
const COVERAGE_THRESHOLD: u8 = 128;

/// Holds the loaded TrueType font, if any. One store serves all sizes since
/// fontdue rasterizes at arbitrary pixel heights from a single face.
pub struct FontStore {
    truetype: Option<Font>,
}

impl FontStore {
    /// Try each candidate path in order and keep the first font that parses.
    pub fn discover(paths: &[String]) -> Self {
        for path in paths {
            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            match Font::from_bytes(bytes, FontSettings::default()) {
                Ok(font) => {
                    info!("Loaded font {path}");
                    return Self {
                        truetype: Some(font),
                    };
                }
                Err(err) => debug!("Skipping font {path}: {err}"),
            }
        }
        info!("No TrueType font found, using built-in mono fonts");
        Self { truetype: None }
    }

    /// A store with no TrueType face, for tests of the fallback path.
    pub fn builtin() -> Self {
        Self { truetype: None }
    }

    pub fn has_truetype(&self) -> bool {
        self.truetype.is_some()
    }

    /// A drawing handle at the requested pixel size.
    pub fn style(&self, px: u32) -> FontStyle<'_> {
        match &self.truetype {
            Some(font) => FontStyle::TrueType { font, px },
            None => FontStyle::Builtin(builtin_for_size(px)),
        }
    }
}

/// A font at a fixed size, ready to measure and draw.
pub enum FontStyle<'a> {
    TrueType { font: &'a Font, px: u32 },
    Builtin(&'static MonoFont<'static>),
}

impl FontStyle<'_> {
    /// Width and height in pixels the text will occupy.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match self {
            FontStyle::TrueType { font, px } => {
                let size = *px as f32;
                let width: f32 = text
                    .chars()
                    .map(|c| font.metrics(c, size).advance_width)
                    .sum();
                (width.ceil() as u32, *px)
            }
            FontStyle::Builtin(mono) => {
                let glyph = mono.character_size;
                let count = text.chars().count() as u32;
                (count * (glyph.width + mono.character_spacing), glyph.height)
            }
        }
    }

    /// Draw `text` with its top-left corner at (x, y), in black.
    pub fn draw(&self, surface: &mut Surface, x: u32, y: u32, text: &str) {
        match self {
            FontStyle::TrueType { font, px } => {
                let size = *px as f32;
                let mut cursor = x as f32;
                for c in text.chars() {
                    let (metrics, bitmap) = font.rasterize(c, size);
                    let glyph_x = cursor as i32 + metrics.xmin;
                    let glyph_y =
                        y as i32 + *px as i32 - metrics.height as i32 - metrics.ymin;
                    for row in 0..metrics.height {
                        for col in 0..metrics.width {
                            if bitmap[row * metrics.width + col] >= COVERAGE_THRESHOLD {
                                let px_x = glyph_x + col as i32;
                                let px_y = glyph_y + row as i32;
                                if px_x >= 0 && px_y >= 0 {
                                    surface.set_black(px_x as u32, px_y as u32);
                                }
                            }
                        }
                    }
                    cursor += metrics.advance_width;
                }
            }
            FontStyle::Builtin(mono) => {
                let style = MonoTextStyle::new(mono, BinaryColor::On);
                // Surface drawing is infallible.
                let _ = Text::with_baseline(
                    text,
                    Point::new(x as i32, y as i32),
                    style,
                    Baseline::Top,
                )
                .draw(surface);
            }
        }
    }

    /// Draw horizontally centered within `[x, x + width)`.
    pub fn draw_centered(&self, surface: &mut Surface, x: u32, y: u32, width: u32, text: &str) {
        let (text_width, _) = self.measure(text);
        let offset = width.saturating_sub(text_width) / 2;
        self.draw(surface, x + offset, y, text);
    }
}

/// Closest built-in mono font for a requested pixel height. The builtin
/// faces top out at 20px, so large sizes (the clock) render smaller than
/// on a device with a real font installed. Acceptable for previews.
fn builtin_for_size(px: u32) -> &'static MonoFont<'static> {
    match px {
        0..=11 => &ascii::FONT_6X10,
        12..=15 => &ascii::FONT_7X13_BOLD,
        16..=19 => &ascii::FONT_9X15_BOLD,
        _ => &ascii::FONT_10X20,
    }
}
