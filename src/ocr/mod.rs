pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::TesseractEngine;
pub use preprocess::prepare_for_ocr;
pub use setup::ensure_tesseract;

use anyhow::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Turns a prepared image into raw recognized text.
pub trait OcrEngine {
    fn recognize(&mut self, img: &GrayImage) -> Result<String>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit Tesseract executable; searched for when unset
    pub tesseract_path: Option<PathBuf>,
    pub language: String,
    /// Tesseract page segmentation mode (6 = single uniform block of text)
    pub psm: u8,
    /// Brightness threshold (pixels with R, G, B all > threshold are kept).
    /// Plain grayscale when unset.
    pub threshold: Option<u8>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            language: "eng".to_string(),
            psm: 6,
            threshold: Some(190),
        }
    }
}
