use image::{GrayImage, Luma, RgbaImage};

/// Converts image to binary by keeping only bright pixels.
///
/// Pixels where R > threshold AND G > threshold AND B > threshold become black (text).
/// All other pixels become white (background).
///
/// Suits light proposal text drawn on a dark panel.
pub fn threshold_bright_pixels(img: &RgbaImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;

        let value = if r > threshold && g > threshold && b > threshold {
            0u8
        } else {
            255u8
        };

        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Prepares a captured region for OCR: binary threshold if configured, else grayscale.
pub fn prepare_for_ocr(img: &RgbaImage, threshold: Option<u8>) -> GrayImage {
    match threshold {
        Some(t) => threshold_bright_pixels(img, t),
        None => image::imageops::grayscale(img),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_threshold_bright_pixels() {
        let mut img = RgbaImage::new(3, 1);

        img.put_pixel(0, 0, Rgba([100, 100, 100, 255]));
        img.put_pixel(1, 0, Rgba([250, 250, 250, 255]));
        img.put_pixel(2, 0, Rgba([250, 250, 100, 255]));

        let result = threshold_bright_pixels(&img, 190);

        assert_eq!(result.get_pixel(0, 0)[0], 255, "Dark pixel should become white");
        assert_eq!(result.get_pixel(1, 0)[0], 0, "Bright pixel should become black");
        assert_eq!(result.get_pixel(2, 0)[0], 255, "Partially dark pixel should become white");
    }

    #[test]
    fn test_prepare_without_threshold_keeps_gray_levels() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([120, 120, 120, 255]));
        let gray = prepare_for_ocr(&img, None);
        assert_eq!(gray.dimensions(), (2, 2));
        assert_eq!(gray.get_pixel(0, 0)[0], 120);
    }
}
