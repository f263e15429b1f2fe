//! Observation recorder.
//!
//! Writes one row per trial to the raw observation log in append-only mode for
//! crash safety. Rows already on disk are never rewritten.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::warn;
use std::path::{Path, PathBuf};

use crate::observation::{Observation, LOG_HEADER};

/// Initializes the log file with a header if it doesn't exist or is empty.
///
/// Existing content is preserved. If it ends in a partial row left by a crash
/// mid-append, a newline is added so the next row starts on its own line.
pub fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .context("Failed to open existing observation log")?;
        let len = file
            .metadata()
            .context("Failed to read observation log metadata")?
            .len();

        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))
                .and_then(|_| file.read_exact(&mut last))
                .context("Failed to read end of observation log")?;
            if last[0] != b'\n' {
                warn!(
                    "{} ends in a partial row, terminating it before appending",
                    path.display()
                );
                file.write_all(b"\n")
                    .context("Failed to terminate partial observation row")?;
            }
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create observation log directory")?;
    }

    let mut file = File::create(path).context("Failed to create observation log")?;
    writeln!(file, "{}", LOG_HEADER).context("Failed to write observation log header")?;
    Ok(())
}

/// Appends one observation row.
///
/// Opens the file in append mode for each write, so completed trials are already
/// on disk if the harvester crashes later.
pub fn append_to_csv(path: &Path, observation: &Observation) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open observation log for append")?;

    writeln!(file, "{}", observation.to_log_line()).context("Failed to write observation row")?;
    Ok(())
}

/// Append-only raw observation log.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    path: PathBuf,
}

impl ObservationLog {
    /// Opens the log, writing the header if the file is new or empty.
    pub fn open(path: &Path) -> Result<Self> {
        init_csv(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn record(&self, observation: &Observation) -> Result<()> {
        append_to_csv(&self.path, observation)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RawLog;
    use crate::seed::Seed;
    use chrono::DateTime;
    use tempfile::tempdir;

    fn observation(seed: &str, raw_text: &str) -> Observation {
        Observation {
            seed: Seed::parse(seed).unwrap(),
            proposals: [
                "Fusion Plant".to_string(),
                "PADU".to_string(),
                "Remote Backups".to_string(),
            ],
            raw_text: raw_text.to_string(),
            timestamp: DateTime::parse_from_rfc3339("2026-01-15T10:00:00Z").unwrap(),
        }
    }

    #[test]
    fn test_init_csv_creates_header() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("output").join("seed-log.csv");

        init_csv(&csv_path).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with(LOG_HEADER));
    }

    #[test]
    fn test_init_csv_preserves_existing() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("seed-log.csv");

        std::fs::write(&csv_path, "existing,data\n1,2,3\n").unwrap();

        init_csv(&csv_path).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with("existing,data"));
    }

    #[test]
    fn test_record_appends_rows() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("seed-log.csv");

        let log = ObservationLog::open(&csv_path).unwrap();
        log.record(&observation("AAAAA", "first")).unwrap();
        log.record(&observation("AAAAB", "second\nline")).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert!(lines[1].starts_with("AAAAA,Fusion Plant,PADU,Remote Backups,\"first\""));
        assert!(lines[2].contains("\"second\\nline\""));
    }

    #[test]
    fn test_reopen_does_not_rewrite() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("seed-log.csv");

        ObservationLog::open(&csv_path)
            .unwrap()
            .record(&observation("AAAAA", "x"))
            .unwrap();
        let before = std::fs::read_to_string(&csv_path).unwrap();

        let log = ObservationLog::open(&csv_path).unwrap();
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), before);

        log.record(&observation("AAAAB", "y")).unwrap();
        let after = std::fs::read_to_string(&csv_path).unwrap();
        assert!(after.starts_with(&before));
    }

    #[test]
    fn test_reopen_terminates_partial_row() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("seed-log.csv");
        std::fs::write(
            &csv_path,
            format!("{}\nAAAAA,PADU,Poems DB,Second Monitor,\"cut", LOG_HEADER),
        )
        .unwrap();

        let log = ObservationLog::open(&csv_path).unwrap();
        log.record(&observation("BBBBB", "after restart")).unwrap();

        let raw = RawLog::from_csv(&csv_path).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.records[0].seed, "BBBBB");
        assert_eq!(raw.records[0].raw_text, "after restart");
        assert_eq!(raw.truncated, 1);
        assert_eq!(raw.malformed, 0);
    }

    #[test]
    fn test_reopen_leaves_terminated_log_alone() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("seed-log.csv");
        let content = format!("{}\nAAAAA,PADU,Poems DB,Second Monitor\n", LOG_HEADER);
        std::fs::write(&csv_path, &content).unwrap();

        ObservationLog::open(&csv_path).unwrap();
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), content);
    }
}
