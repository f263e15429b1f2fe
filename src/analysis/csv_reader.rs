//! Reader for the raw observation log produced by the harvester.
//!
//! Rows that cannot be parsed are counted, never silently dropped. A final row
//! without a trailing newline is what a crash mid-append leaves behind: it is kept
//! only if it parses completely (all columns and a valid timestamp), otherwise it
//! is counted as truncated. The recorder terminates such a row before appending
//! after a restart, so an unclosed quoted field mid-file is also counted as
//! truncated: the writer escapes newlines, so nothing else produces one.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::path::Path;
use tracing::warn;

use crate::observation::{parse_timestamp, split_fields, unescape_text, LineError, LOG_COLUMNS};
use crate::proposals::PROPOSALS_PER_SEED;

/// Minimum columns for a usable row: seed plus three proposals.
const MIN_COLUMNS: usize = 1 + PROPOSALS_PER_SEED;

/// One row of the raw log, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the source file
    pub line: usize,
    pub seed: String,
    pub proposals: [String; PROPOSALS_PER_SEED],
    pub raw_text: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// All rows read from one raw log, in file order.
#[derive(Debug, Clone, Default)]
pub struct RawLog {
    pub records: Vec<RawRecord>,
    /// Rows that could not be parsed
    pub malformed: usize,
    /// Incomplete final rows left by an interrupted write
    pub truncated: usize,
}

impl RawLog {
    /// Loads a raw log from disk.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read raw log: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Parses raw log content. A header row (starting with `seed,`) is skipped.
    pub fn parse(content: &str) -> Self {
        let mut log = RawLog::default();
        let ends_cleanly = content.is_empty() || content.ends_with('\n');
        let lines: Vec<&str> = content.lines().collect();
        let last = lines.len().saturating_sub(1);

        for (idx, line) in lines.iter().enumerate() {
            let line_num = idx + 1;

            if idx == 0 && line.starts_with("seed,") {
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let unterminated = idx == last && !ends_cleanly;

            match parse_line(line, line_num) {
                Ok(record) if unterminated && record.timestamp.is_none() => {
                    warn!(
                        "Discarding truncated final row {} (no complete timestamp)",
                        line_num
                    );
                    log.truncated += 1;
                }
                Ok(record) => log.records.push(record),
                Err(e) if unterminated || is_torn(&e) => {
                    warn!("Discarding truncated row {}: {}", line_num, e);
                    log.truncated += 1;
                }
                Err(e) => {
                    warn!("Skipping malformed row {}: {}", line_num, e);
                    log.malformed += 1;
                }
            }
        }

        log
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_torn(err: &anyhow::Error) -> bool {
    err.downcast_ref::<LineError>() == Some(&LineError::UnterminatedQuote)
}

/// Parses a single row into a `RawRecord`.
///
/// Four-column rows (`seed,p1,p2,p3`) from older harvests are accepted without
/// raw text or timestamp. A timestamp column that is present must parse.
fn parse_line(line: &str, line_num: usize) -> Result<RawRecord> {
    let fields = split_fields(line)?;

    if fields.len() < MIN_COLUMNS || fields.len() > LOG_COLUMNS {
        anyhow::bail!(
            "Expected {} to {} columns, got {}",
            MIN_COLUMNS,
            LOG_COLUMNS,
            fields.len()
        );
    }

    let proposals = [
        fields[1].trim().to_string(),
        fields[2].trim().to_string(),
        fields[3].trim().to_string(),
    ];
    let raw_text = fields.get(4).map(|t| unescape_text(t)).unwrap_or_default();

    let timestamp = match fields.get(5) {
        Some(text) => Some(
            parse_timestamp(text).ok_or_else(|| anyhow::anyhow!("Invalid timestamp {:?}", text))?,
        ),
        None => None,
    };

    Ok(RawRecord {
        line: line_num,
        seed: fields[0].trim().to_string(),
        proposals,
        raw_text,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "seed,proposal1,proposal2,proposal3,raw_text,timestamp";

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_parse_valid_csv() {
        let csv_content = format!(
            "{HEADER}
AAAAA,PADU,Poems DB,Second Monitor,\"PADU POEMS DB\",2026-01-15T10:00:00+00:00
AAAAB,Fusion Plant,Lean Administration,\"Cabler's Union (Base)\",\"a\\nb\",2026-01-15T10:01:00+00:00
"
        );

        let file = create_test_csv(&csv_content);
        let log = RawLog::from_csv(file.path()).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.records[0].seed, "AAAAA");
        assert_eq!(log.records[0].proposals[2], "Second Monitor");
        assert_eq!(log.records[1].proposals[2], "Cabler's Union (Base)");
        assert_eq!(log.records[1].raw_text, "a\nb");
        assert_eq!(log.records[1].line, 3);
        assert!(log.records[1].timestamp.is_some());
        assert_eq!(log.malformed, 0);
        assert_eq!(log.truncated, 0);
    }

    #[test]
    fn test_legacy_four_columns() {
        let log = RawLog::parse("seed,proposal1,proposal2,proposal3\nABC12,Remote Backups,PADU,Lean Administration\n");
        assert_eq!(log.len(), 1);
        assert_eq!(log.records[0].raw_text, "");
        assert_eq!(log.records[0].timestamp, None);
    }

    #[test]
    fn test_empty_csv_header_only() {
        let log = RawLog::parse(&format!("{HEADER}\n"));
        assert!(log.is_empty());
        assert_eq!(log.malformed, 0);
    }

    #[test]
    fn test_skip_empty_lines() {
        let log = RawLog::parse(&format!(
            "{HEADER}
AAAAA,PADU,Poems DB,Second Monitor,\"x\",2026-01-15T10:00:00+00:00

AAAAB,PADU,Poems DB,Second Monitor,\"y\",2026-01-15T10:00:00+00:00
"
        ));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_malformed_rows_are_counted() {
        let log = RawLog::parse(&format!(
            "{HEADER}
AAAAA,PADU
AAAAB,PADU,Poems DB,Second Monitor,\"x\",yesterday
AAAAC,PADU,Poems DB,Second Monitor,\"x\",2026-01-15T10:00:00+00:00
"
        ));
        assert_eq!(log.len(), 1);
        assert_eq!(log.malformed, 2);
        assert_eq!(log.truncated, 0);
    }

    #[test]
    fn test_truncated_final_row_mid_text() {
        let log = RawLog::parse(&format!(
            "{HEADER}
AAAAA,PADU,Poems DB,Second Monitor,\"x\",2026-01-15T10:00:00+00:00
AAAAB,PADU,Poems DB,Second Monitor,\"cut off"
        ));
        assert_eq!(log.len(), 1);
        assert_eq!(log.truncated, 1);
        assert_eq!(log.malformed, 0);
    }

    #[test]
    fn test_truncated_final_row_missing_timestamp() {
        let log = RawLog::parse(&format!(
            "{HEADER}
AAAAB,PADU,Poems DB,Second Monitor,\"complete text\","
        ));
        assert_eq!(log.len(), 0);
        assert_eq!(log.truncated, 1);
    }

    #[test]
    fn test_complete_final_row_without_newline_is_kept() {
        let log = RawLog::parse(&format!(
            "{HEADER}
AAAAB,PADU,Poems DB,Second Monitor,\"complete\",2026-01-15T10:00:00+00:00"
        ));
        assert_eq!(log.len(), 1);
        assert_eq!(log.truncated, 0);
    }

    #[test]
    fn test_terminated_torn_row_counts_as_truncated() {
        let log = RawLog::parse(&format!(
            "{HEADER}
AAAAA,PADU,Poems DB,Second Monitor,\"cut
AAAAB,PADU,Poems DB,Second Monitor,\"whole\",2026-01-15T10:00:00+00:00
"
        ));
        assert_eq!(log.len(), 1);
        assert_eq!(log.records[0].seed, "AAAAB");
        assert_eq!(log.truncated, 1);
        assert_eq!(log.malformed, 0);
    }
}
