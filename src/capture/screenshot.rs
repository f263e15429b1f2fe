//! Screenshot capture through an external command.
//!
//! The command is configured as an argv list; `{path}` is replaced with the PNG
//! file the command must write (e.g. `["scrot", "-o", "{path}"]` or
//! `["grim", "{path}"]`). The full screenshot is loaded and cropped to the region.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{crop_pixels, PixelRect, ScreenCapture};

const PATH_PLACEHOLDER: &str = "{path}";

pub struct CommandCapture {
    argv: Vec<String>,
    /// Directory for temporary screenshot files
    scratch_dir: PathBuf,
}

impl CommandCapture {
    pub fn new(argv: Vec<String>, scratch_dir: &Path) -> Result<Self> {
        if argv.is_empty() {
            return Err(anyhow!("Capture command is empty"));
        }
        Ok(Self {
            argv,
            scratch_dir: scratch_dir.to_path_buf(),
        })
    }

    fn capture_full(&self) -> Result<RgbaImage> {
        std::fs::create_dir_all(&self.scratch_dir)
            .context("Failed to create capture directory")?;
        let temp = NamedTempFile::with_suffix_in(".png", &self.scratch_dir)?;
        let path = temp.path().to_string_lossy().to_string();

        let args: Vec<String> = self
            .argv
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path))
            .collect();

        debug!("Running capture command: {:?}", args);
        let output = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .context(format!("Failed to run capture command {:?}", args[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Capture command failed: {}", stderr.trim()));
        }

        let img = image::open(temp.path())
            .context("Failed to load captured screenshot")?
            .to_rgba8();
        Ok(img)
    }
}

impl ScreenCapture for CommandCapture {
    fn capture(&mut self, region: &PixelRect) -> Result<RgbaImage> {
        let full = self.capture_full()?;
        Ok(crop_pixels(&full, region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_command_rejected() {
        let dir = tempdir().unwrap();
        assert!(CommandCapture::new(Vec::new(), dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_via_copy_command() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("screen.png");
        RgbaImage::from_pixel(40, 30, image::Rgba([200, 200, 200, 255]))
            .save(&source)
            .unwrap();

        let mut capture = CommandCapture::new(
            vec![
                "cp".to_string(),
                source.to_string_lossy().to_string(),
                "{path}".to_string(),
            ],
            &dir.path().join("scratch"),
        )
        .unwrap();

        let img = capture
            .capture(&PixelRect { x: 5, y: 5, width: 10, height: 8 })
            .unwrap();
        assert_eq!(img.dimensions(), (10, 8));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_error() {
        let dir = tempdir().unwrap();
        let mut capture =
            CommandCapture::new(vec!["false".to_string()], dir.path()).unwrap();
        assert!(capture.capture(&PixelRect::default()).is_err());
    }
}
