//! Synthetic device frames.
//!
//! `ScreenCanvas` draws simple phone-like screens (bars, buttons, labels) and
//! encodes them as PNG. It backs the `mock` subcommand and gives tests real
//! image files to push through the diff pipeline.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;
use std::path::Path;

use super::types::{FrameError, FrameResult};

/// Typical phone resolution used by the planner's coordinate hints
pub const PHONE_WIDTH: u32 = 1080;
pub const PHONE_HEIGHT: u32 = 2400;

/// An RGB drawing surface
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenCanvas {
    width: u32,
    height: u32,
    /// Row-major, 3 bytes per pixel
    buffer: Vec<u8>,
}

impl ScreenCanvas {
    /// Create a canvas initialized to black
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffer: vec![0u8; (width * height * 3) as usize],
        }
    }

    /// Create a canvas filled with `color`
    pub fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut canvas = Self::new(width, height);
        canvas.fill(color);
        canvas
    }

    /// Full-size phone screen with a status bar and a bottom navigation bar
    pub fn phone(background: [u8; 3]) -> Self {
        let mut canvas = Self::with_color(PHONE_WIDTH, PHONE_HEIGHT, background);
        canvas.draw_rect(0, 0, PHONE_WIDTH, 100, [32, 32, 32]);
        canvas.draw_rect(0, PHONE_HEIGHT - 160, PHONE_WIDTH, 160, [32, 32, 32]);
        canvas
    }

    /// Decode a canvas from PNG bytes
    pub fn from_png_bytes(data: &[u8]) -> FrameResult<Self> {
        let rgb = image::load_from_memory(data)?.to_rgb8();
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            buffer: rgb.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle, clipped to the canvas
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw text with 8x8 glyphs scaled by `scale`. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, scale: u32, fg: [u8; 3]) {
        let scale = scale.max(1);
        let mut cursor_x = x;
        for ch in text.chars() {
            if cursor_x >= self.width {
                break;
            }
            self.draw_char(cursor_x, y, ch, scale, fg);
            cursor_x += 8 * scale;
        }
    }

    /// Draw a labelled button centred on `(cx, cy)`
    pub fn draw_button(&mut self, cx: u32, cy: u32, label: &str, fill: [u8; 3], fg: [u8; 3]) {
        let scale = 4;
        let text_w = label.chars().count() as u32 * 8 * scale;
        let w = text_w + 64;
        let h = 8 * scale + 48;
        let x = cx.saturating_sub(w / 2);
        let y = cy.saturating_sub(h / 2);
        self.draw_rect(x, y, w, h, fill);
        self.draw_text(x + 32, y + 24, label, scale, fg);
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, scale: u32, fg: [u8; 3]) {
        let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            for bit in 0..8u32 {
                // font8x8 stores LSB as leftmost pixel
                if (row >> bit) & 1 == 1 {
                    self.draw_rect(x + bit * scale, y + row_idx as u32 * scale, scale, scale, fg);
                }
            }
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y * self.width + x) * 3) as usize;
        [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.buffer[idx..idx + 3].copy_from_slice(&color);
    }

    pub fn to_image(&self) -> FrameResult<RgbImage> {
        ImageBuffer::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| FrameError::Decode("buffer size does not match dimensions".to_string()))
    }

    /// Encode as PNG bytes
    pub fn to_png(&self) -> FrameResult<Vec<u8>> {
        let img = self.to_image()?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Encode as PNG and write to `path`
    pub fn save(&self, path: &Path) -> FrameResult<()> {
        std::fs::write(path, self.to_png()?)?;
        Ok(())
    }
}
