//! One trial's result and its line format in the raw observation log.
//!
//! Line layout: `seed,proposal1,proposal2,proposal3,"raw text",timestamp`.
//! The raw text is always quoted, with `"` doubled and backslash, CR and LF escaped,
//! so every record stays on a single line.

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use thiserror::Error;

use crate::proposals::{PROPOSALS_PER_SEED, UNKNOWN_PROPOSAL};
use crate::seed::Seed;

/// Header row of the raw observation log.
pub const LOG_HEADER: &str = "seed,proposal1,proposal2,proposal3,raw_text,timestamp";

/// Number of columns in a raw log row.
pub const LOG_COLUMNS: usize = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub seed: Seed,
    /// Proposals in slot order (or discovery order when slots are not captured separately)
    pub proposals: [String; PROPOSALS_PER_SEED],
    pub raw_text: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl Observation {
    /// Creates an observation stamped with the current local time.
    pub fn now(seed: Seed, proposals: [String; PROPOSALS_PER_SEED], raw_text: String) -> Self {
        Self {
            seed,
            proposals,
            raw_text,
            timestamp: Local::now().fixed_offset(),
        }
    }

    /// True when all slots hold a recognized proposal and no proposal repeats.
    pub fn is_complete(&self) -> bool {
        !self.proposals.iter().any(|p| p == UNKNOWN_PROPOSAL) && has_distinct(&self.proposals)
    }

    /// Formats the observation as one log line, without the trailing newline.
    pub fn to_log_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.seed,
            quote_if_needed(&self.proposals[0]),
            quote_if_needed(&self.proposals[1]),
            quote_if_needed(&self.proposals[2]),
            quote(&escape_text(&self.raw_text)),
            format_timestamp(&self.timestamp),
        )
    }
}

pub fn has_distinct(proposals: &[String; PROPOSALS_PER_SEED]) -> bool {
    proposals[0] != proposals[1] && proposals[0] != proposals[2] && proposals[1] != proposals[2]
}

pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text.trim()).ok()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("unexpected character after closing quote")]
    TrailingAfterQuote,
}

/// Splits one log line into fields, honouring double-quoted fields.
pub fn split_fields(line: &str) -> Result<Vec<String>, LineError> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        let mut field = String::new();

        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        closed = true;
                        break;
                    }
                } else {
                    field.push(c);
                }
            }
            if !closed {
                return Err(LineError::UnterminatedQuote);
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(',') => fields.push(field),
                Some(_) => return Err(LineError::TrailingAfterQuote),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(',') => break,
                    Some(c) => field.push(c),
                }
            }
            fields.push(field);
        }
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn quote_if_needed(field: &str) -> String {
    if field.contains([',', '"']) {
        quote(field)
    } else {
        field.to_string()
    }
}

/// Escapes backslash, CR and LF so the text fits on one line.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses `escape_text`. Unknown escapes are kept as written.
pub fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(raw_text: &str) -> Observation {
        Observation {
            seed: Seed::parse("AB12Z").unwrap(),
            proposals: [
                "PADU".to_string(),
                "Poems DB".to_string(),
                "Second Monitor".to_string(),
            ],
            raw_text: raw_text.to_string(),
            timestamp: DateTime::parse_from_rfc3339("2026-01-15T10:00:00+09:00").unwrap(),
        }
    }

    #[test]
    fn test_log_line_layout() {
        let line = observation("PADU POEMS DB").to_log_line();
        assert_eq!(
            line,
            "AB12Z,PADU,Poems DB,Second Monitor,\"PADU POEMS DB\",2026-01-15T10:00:00+09:00"
        );
    }

    #[test]
    fn test_raw_text_stays_on_one_line() {
        let line = observation("line one\nsays \"hi\", then C:\\path").to_log_line();
        assert!(!line.contains('\n'));

        let fields = split_fields(&line).unwrap();
        assert_eq!(fields.len(), LOG_COLUMNS);
        assert_eq!(unescape_text(&fields[4]), "line one\nsays \"hi\", then C:\\path");
        assert_eq!(fields[5], "2026-01-15T10:00:00+09:00");
    }

    #[test]
    fn test_split_fields_unterminated() {
        assert_eq!(
            split_fields("AAAAA,PADU,Poems DB,Second Monitor,\"cut off"),
            Err(LineError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_split_fields_trailing_after_quote() {
        assert_eq!(split_fields("\"a\"b,c"), Err(LineError::TrailingAfterQuote));
    }

    #[test]
    fn test_split_fields_empty_trailing_field() {
        assert_eq!(split_fields("a,b,").unwrap(), vec!["a", "b", ""]);
    }

    #[test]
    fn test_is_complete() {
        let mut obs = observation("");
        assert!(obs.is_complete());

        obs.proposals[2] = UNKNOWN_PROPOSAL.to_string();
        assert!(!obs.is_complete());

        obs.proposals[2] = "PADU".to_string();
        assert!(!obs.is_complete());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let obs = observation("");
        let text = format_timestamp(&obs.timestamp);
        assert_eq!(parse_timestamp(&text), Some(obs.timestamp));
        assert_eq!(parse_timestamp("2026-01-15T10:0"), None);
    }
}
