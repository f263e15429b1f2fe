use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

/// Returns the per-user directory for a bundled Tesseract install
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seed-harvester")
        .join("tesseract")
}

/// Locates the Tesseract executable.
///
/// Checks, in order: the configured path, `<data_local_dir>/seed-harvester/tesseract/`,
/// then the system PATH.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!(
            "Configured Tesseract not found: {}",
            path.display()
        ));
    }

    let local = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local.exists() {
        return Ok(local);
    }

    if let Ok(output) = Command::new(EXECUTABLE_NAME).arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from(EXECUTABLE_NAME));
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install it, add it to PATH, or set ocr.tesseract_path \
         (local install directory: {})",
        get_tesseract_dir().display()
    ))
}

/// Returns the tessdata directory next to a local install, if there is one.
pub fn find_tessdata_dir(executable: &Path) -> Option<PathBuf> {
    let dir = executable.parent()?.join("tessdata");
    dir.is_dir().then_some(dir)
}

/// Checks that Tesseract can be run and logs where it was found.
pub fn ensure_tesseract(configured: Option<&Path>) -> Result<PathBuf> {
    let executable = find_tesseract_executable(configured)?;
    info!("Tesseract found at: {}", executable.display());
    Ok(executable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_configured_path_wins() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("tesseract");
        std::fs::write(&exe, "").unwrap();

        assert_eq!(find_tesseract_executable(Some(&exe)).unwrap(), exe);
    }

    #[test]
    fn test_missing_configured_path_is_error() {
        let dir = tempdir().unwrap();
        assert!(find_tesseract_executable(Some(&dir.path().join("nope"))).is_err());
    }

    #[test]
    fn test_tessdata_next_to_executable() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("tesseract");
        assert_eq!(find_tessdata_dir(&exe), None);

        std::fs::create_dir(dir.path().join("tessdata")).unwrap();
        assert_eq!(find_tessdata_dir(&exe), Some(dir.path().join("tessdata")));
    }
}
