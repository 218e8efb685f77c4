//! Fixed 32×8 pixel buffer addressed through the serpentine coordinate map
//! of the physical WS2812 wiring: even rows run left→right, odd rows
//! right→left. The buffer stores pixels in strip order so the firmware can
//! DMA it out unmodified.

use embedded_graphics::{
    Pixel,
    pixelcolor::Rgb888,
    prelude::{DrawTarget, OriginDimensions, RgbColor, Size},
};

use crate::{HEIGHT, PIXELS, WIDTH};

/// Strip index of the pixel at matrix coordinates `(x, y)`.
#[inline]
pub fn serpentine_index(x: usize, y: usize) -> usize {
    debug_assert!(x < WIDTH && y < HEIGHT);
    if y % 2 == 0 {
        y * WIDTH + x
    } else {
        y * WIDTH + (WIDTH - 1 - x)
    }
}

/// The render engine's private frame buffer. Never shared with the network
/// context; the compositor fills it under the state lock and the firmware
/// blits it afterwards.
pub struct PixelBuffer {
    pixels: [Rgb888; PIXELS],
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelBuffer {
    pub fn new() -> Self {
        Self {
            pixels: [Rgb888::BLACK; PIXELS],
        }
    }

    pub fn clear(&mut self) {
        self.pixels = [Rgb888::BLACK; PIXELS];
    }

    /// Set one pixel. Out-of-bounds coordinates are dropped.
    pub fn set(&mut self, x: i32, y: i32, color: Rgb888) {
        if x >= 0 && y >= 0 && (x as usize) < WIDTH && (y as usize) < HEIGHT {
            self.pixels[serpentine_index(x as usize, y as usize)] = color;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb888 {
        self.pixels[serpentine_index(x, y)]
    }

    /// Pixels in physical strip order, ready for the WS2812 driver.
    pub fn strip(&self) -> &[Rgb888; PIXELS] {
        &self.pixels
    }

    /// Number of lit (non-black) pixels. Handy for tests and the frame log.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p != Rgb888::BLACK).count()
    }
}

impl OriginDimensions for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for PixelBuffer {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels.into_iter() {
            self.set(coord.x, coord.y, color);
        }
        Ok(())
    }
}

/// Scale one color channel by a brightness factor (0 = off, 255 = full).
#[inline]
pub fn scale_channel(c: u8, brightness: u8) -> u8 {
    ((c as u16 * brightness as u16) / 255) as u8
}

/// Apply output brightness to a pixel.
#[inline]
pub fn scale_pixel(p: Rgb888, brightness: u8) -> Rgb888 {
    Rgb888::new(
        scale_channel(p.r(), brightness),
        scale_channel(p.g(), brightness),
        scale_channel(p.b(), brightness),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn serpentine_flips_odd_rows() {
        assert_eq!(serpentine_index(0, 0), 0);
        assert_eq!(serpentine_index(31, 0), 31);
        assert_eq!(serpentine_index(0, 1), 63);
        assert_eq!(serpentine_index(31, 1), 32);
        assert_eq!(serpentine_index(0, 2), 64);
        assert_eq!(serpentine_index(31, 7), 7 * 32);
    }

    #[test]
    fn set_out_of_bounds_is_dropped() {
        let mut buf = PixelBuffer::new();
        buf.set(-1, 0, Rgb888::WHITE);
        buf.set(0, -1, Rgb888::WHITE);
        buf.set(32, 0, Rgb888::WHITE);
        buf.set(0, 8, Rgb888::WHITE);
        assert_eq!(buf.lit_count(), 0);
    }

    #[test]
    fn set_get_round_trip() {
        let mut buf = PixelBuffer::new();
        buf.set(5, 3, Rgb888::new(1, 2, 3));
        assert_eq!(buf.get(5, 3), Rgb888::new(1, 2, 3));
        assert_eq!(buf.lit_count(), 1);
    }

    #[test]
    fn brightness_scaling_endpoints() {
        let p = Rgb888::new(200, 100, 50);
        assert_eq!(scale_pixel(p, 255), p);
        assert_eq!(scale_pixel(p, 0), Rgb888::BLACK);
        let half = scale_pixel(p, 128);
        assert_eq!(half, Rgb888::new(100, 50, 25));
    }

    proptest! {
        // every (x, y) maps to a unique strip slot and back
        #[test]
        fn serpentine_is_a_bijection(
            x1 in 0usize..WIDTH, y1 in 0usize..HEIGHT,
            x2 in 0usize..WIDTH, y2 in 0usize..HEIGHT,
        ) {
            let i1 = serpentine_index(x1, y1);
            let i2 = serpentine_index(x2, y2);
            prop_assert!(i1 < PIXELS);
            if (x1, y1) != (x2, y2) {
                prop_assert_ne!(i1, i2);
            }
        }

        #[test]
        fn scaled_channel_never_exceeds_source(c in any::<u8>(), b in any::<u8>()) {
            prop_assert!(scale_channel(c, b) <= c);
        }
    }
}
