//! Screen capture for the automation driver.
//!
//! This module provides:
//! - Pixel regions of interest (`PixelRect`) and cropping
//! - The `ScreenCapture` seam used by the trial state machine
//! - A command-driven implementation (`CommandCapture`)

pub mod screenshot;

pub use screenshot::CommandCapture;

use anyhow::Result;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A rectangle in absolute screen pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for PixelRect {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }
    }
}

/// Captures one region of the screen.
pub trait ScreenCapture {
    fn capture(&mut self, region: &PixelRect) -> Result<RgbaImage>;
}

/// Crops a sub-region from an image, clamped to the image bounds.
pub fn crop_pixels(img: &RgbaImage, region: &PixelRect) -> RgbaImage {
    let (w, h) = img.dimensions();

    let x0 = region.x.min(w);
    let y0 = region.y.min(h);
    let rw = region.width.min(w - x0);
    let rh = region.height.min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_crop_pixels() {
        let img = RgbaImage::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let region = PixelRect { x: 10, y: 50, width: 50, height: 20 };
        let cropped = crop_pixels(&img, &region);

        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_pixels_clamps() {
        let img = RgbaImage::new(100, 100);
        let region = PixelRect { x: 90, y: 90, width: 50, height: 50 };
        assert_eq!(crop_pixels(&img, &region).dimensions(), (10, 10));

        let outside = PixelRect { x: 200, y: 200, width: 5, height: 5 };
        assert_eq!(crop_pixels(&img, &outside).dimensions(), (0, 0));
    }
}
