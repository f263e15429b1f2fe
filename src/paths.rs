use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Replaces `path` with `contents` via a temporary file in the same directory and
/// a rename, so readers see either the old or the new contents, never a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// File layout of a harvester installation, rooted at a base directory.
#[derive(Debug, Clone)]
pub struct HarvestPaths {
    base: PathBuf,
}

impl HarvestPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the config file: `<base>/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Returns the logs directory: `<base>/logs/`
    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("seed-harvester.log")
    }

    /// Returns the raw log directory: `<base>/output/`
    pub fn output_dir(&self) -> PathBuf {
        self.base.join("output")
    }

    pub fn raw_log(&self) -> PathBuf {
        self.output_dir().join("seed-log.csv")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    /// Returns the resume file: `<base>/data/last-seed.txt`
    pub fn resume_file(&self) -> PathBuf {
        self.data_dir().join("last-seed.txt")
    }

    pub fn diagnostics_file(&self) -> PathBuf {
        self.data_dir().join("unknown").join("unknown-seeds.jsonl")
    }

    /// Returns the clean data directory: `<base>/data/clean-collection-json/`
    pub fn clean_dir(&self) -> PathBuf {
        self.data_dir().join("clean-collection-json")
    }

    pub fn master_file(&self) -> PathBuf {
        self.clean_dir().join("merged-seeds.json")
    }

    pub fn statistics_file(&self) -> PathBuf {
        self.clean_dir().join("statistics.json")
    }

    /// Returns the raw log archive: `<base>/data/dirty-collection-csv/`
    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir().join("dirty-collection-csv")
    }

    pub fn frontend_file(&self) -> PathBuf {
        self.base.join("frontend").join("seed-finder.html")
    }

    /// Returns the capture scratch directory: `<base>/captures/`
    pub fn captures_dir(&self) -> PathBuf {
        self.base.join("captures")
    }

    /// Ensures all output directories exist. Call at startup.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.output_dir())?;
        std::fs::create_dir_all(self.clean_dir())?;
        std::fs::create_dir_all(self.archive_dir())?;
        std::fs::create_dir_all(self.base.join("frontend"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_under_base() {
        let paths = HarvestPaths::new("/srv/harvest");
        assert_eq!(
            paths.master_file(),
            PathBuf::from("/srv/harvest/data/clean-collection-json/merged-seeds.json")
        );
        assert_eq!(paths.raw_log(), PathBuf::from("/srv/harvest/output/seed-log.csv"));
        assert!(!paths.diagnostics_file().starts_with(paths.output_dir()));
        assert!(!paths.resume_file().starts_with(paths.output_dir()));
    }

    #[test]
    fn test_write_atomic_replaces_and_creates_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let paths = HarvestPaths::new(dir.path());
        paths.ensure_directories().unwrap();

        assert!(paths.output_dir().is_dir());
        assert!(paths.clean_dir().is_dir());
        assert!(paths.archive_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
