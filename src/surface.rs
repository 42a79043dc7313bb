//! # 1-bit Drawing Surface
//!
//! The in-memory framebuffer every region renderer paints into. One byte per
//! pixel (0 = black, 255 = white) keeps drawing code simple; `pack_1bpp`
//! produces the MSB-first row-packed buffer the panel consumes at push time.
//!
//! The surface also implements the embedded-graphics `DrawTarget` so built-in
//! mono fonts can be drawn on it when no system TrueType font is available.

use crate::regions::Region;
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{DrawTarget, OriginDimensions, Size},
    Pixel,
};
use image::GrayImage;

/// Panel width in pixels (Waveshare 4.26").
pub const DISPLAY_WIDTH: u32 = 800;
/// Panel height in pixels.
pub const DISPLAY_HEIGHT: u32 = 480;

const WHITE: u8 = 255;
const BLACK: u8 = 0;

/// A byte-per-pixel two-level framebuffer, white by default.
#[derive(Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// A full-panel surface cleared to white.
    pub fn new() -> Self {
        Self::with_size(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![WHITE; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Clear the whole surface to white. Only full refreshes do this.
    pub fn clear(&mut self) {
        self.pixels.fill(WHITE);
    }

    /// Clear one region to white before repainting it.
    pub fn clear_region(&mut self, region: Region) {
        let (left, top, right, bottom) = region.bounds();
        let right = right.min(self.width);
        let bottom = bottom.min(self.height);
        for y in top..bottom {
            let row = (y * self.width) as usize;
            self.pixels[row + left as usize..row + right as usize].fill(WHITE);
        }
    }

    /// Set one pixel; coordinates outside the surface are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.pixels[(y * self.width + x) as usize] = value;
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return WHITE;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set_black(&mut self, x: u32, y: u32) {
        self.set_pixel(x, y, BLACK);
    }

    /// Paste a two-level grayscale image with its top-left corner at (x, y).
    /// Pixels falling outside the surface are clipped.
    pub fn paste(&mut self, image: &GrayImage, x: u32, y: u32) {
        for (dx, dy, pixel) in image.enumerate_pixels() {
            self.set_pixel(x + dx, y + dy, pixel.0[0]);
        }
    }

    /// True when any pixel inside the region is black. Used by tests and by
    /// the status line to detect whether a renderer actually painted.
    pub fn region_has_ink(&self, region: Region) -> bool {
        let (left, top, right, bottom) = region.bounds();
        let right = right.min(self.width);
        let bottom = bottom.min(self.height);
        (top..bottom).any(|y| (left..right).any(|x| self.get_pixel(x, y) < 128))
    }

    /// Raw byte-per-pixel contents, row-major. The preview sink serializes
    /// this directly into a grayscale PNG.
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// Pack into the panel's wire format: one bit per pixel, MSB first
    /// within each byte, rows padded to whole bytes. Bit set means white.
    pub fn pack_1bpp(&self) -> Vec<u8> {
        let bytes_per_row = self.width.div_ceil(8);
        let mut packed = vec![0xFFu8; (bytes_per_row * self.height) as usize];
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get_pixel(x, y) < 128 {
                    let index = (y * bytes_per_row + x / 8) as usize;
                    packed[index] &= !(0x80 >> (x % 8));
                }
            }
        }
        packed
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for Surface {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Surface {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                let value = match color {
                    BinaryColor::On => BLACK,
                    BinaryColor::Off => WHITE,
                };
                self.set_pixel(point.x as u32, point.y as u32, value);
            }
        }
        Ok(())
    }
}
