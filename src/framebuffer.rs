//! 1-bit framebuffer matching the panel's native resolution.
//!
//! Layout is row-major, 8 horizontal pixels per byte, MSB first; a set bit is a
//! lit pixel. That is the same packing embedded-graphics uses for
//! `ImageRaw<BinaryColor>`, so a buffer can be blitted onto any `DrawTarget`
//! without conversion.

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};
use std::convert::Infallible;

/// SSD1306 128x64 module
pub const PANEL_WIDTH: u32 = 128;
pub const PANEL_HEIGHT: u32 = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        // Each row has (width+7)/8 bytes
        let bytes_per_row = width.div_ceil(8);
        Self {
            width,
            height,
            bits: vec![0x00; (bytes_per_row * height) as usize], // Dark by default
        }
    }

    /// A blank buffer sized for the panel.
    pub fn panel() -> Self {
        Self::new(PANEL_WIDTH, PANEL_HEIGHT)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn clear(&mut self) {
        self.bits.fill(0x00);
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (index, mask) = self.locate(x, y);
        if on {
            self.bits[index] |= mask;
        } else {
            self.bits[index] &= !mask;
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (index, mask) = self.locate(x, y);
        self.bits[index] & mask != 0
    }

    /// Number of lit pixels.
    pub fn lit_pixels(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    /// Render the buffer as text, `#` for lit and `.` for dark pixels.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(if self.pixel(x, y) { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let bytes_per_row = self.width.div_ceil(8);
        let index = (y * bytes_per_row + x / 8) as usize;
        (index, 0x80 >> (x % 8))
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::panel()
    }
}

impl OriginDimensions for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PixelBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn new_buffer_is_dark() {
        let buffer = PixelBuffer::panel();
        assert_eq!(buffer.as_bytes().len(), 128 * 64 / 8);
        assert_eq!(buffer.lit_pixels(), 0);
    }

    #[test]
    fn set_pixel_packs_msb_first() {
        let mut buffer = PixelBuffer::panel();
        buffer.set_pixel(0, 0, true);
        buffer.set_pixel(9, 1, true);
        assert_eq!(buffer.as_bytes()[0], 0x80);
        assert_eq!(buffer.as_bytes()[16 + 1], 0x40);
        assert!(buffer.pixel(9, 1));

        buffer.set_pixel(9, 1, false);
        assert!(!buffer.pixel(9, 1));
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut buffer = PixelBuffer::panel();
        buffer.set_pixel(PANEL_WIDTH, 0, true);
        buffer.set_pixel(0, PANEL_HEIGHT, true);
        assert_eq!(buffer.lit_pixels(), 0);
        assert!(!buffer.pixel(500, 500));
    }

    #[test]
    fn draw_target_clips_negative_coordinates() {
        let mut buffer = PixelBuffer::panel();
        Rectangle::new(Point::new(-2, -2), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut buffer)
            .unwrap();
        assert_eq!(buffer.lit_pixels(), 4);
    }

    #[test]
    fn ascii_dump_has_one_line_per_row() {
        let mut buffer = PixelBuffer::new(8, 2);
        buffer.set_pixel(1, 0, true);
        assert_eq!(buffer.to_ascii(), ".#......\n........\n");
    }
}
