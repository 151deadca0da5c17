//! Per-log-type line parsing: raw text line → named field map.
//!
//! Each module configures a named-capture regex; the parser is compiled once
//! and applied per line. Every parser is expected to bind `Date` and `Time`;
//! all other fields are log-type specific.

use std::collections::BTreeMap;

use regex::Regex;

use crate::core::errors::{LshError, Result};

/// Field map produced by parsing one raw log line.
pub type LogRecord = BTreeMap<String, String>;

/// Turns raw lines into field maps and refines derived fields.
pub trait LogParser {
    /// Parse one raw line; `None` means the line does not match the format.
    fn parse_line(&self, line: &str) -> Option<LogRecord>;

    /// Refine derived fields after parsing. The raw `Time` value must survive
    /// untouched so hour/minute bucketing still works downstream.
    fn post_process(&self, record: &mut LogRecord) {
        let _ = record;
    }
}

/// Parser driven by a configured named-capture pattern.
#[derive(Debug, Clone)]
pub struct RegexLineParser {
    pattern: Regex,
}

impl RegexLineParser {
    /// Compile the line pattern. Rejects patterns without named captures,
    /// since those can never produce a usable field map.
    pub fn new(pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|error| LshError::InvalidConfig {
            details: format!("line_pattern {pattern:?}: {error}"),
        })?;
        if compiled.capture_names().flatten().next().is_none() {
            return Err(LshError::InvalidConfig {
                details: format!("line_pattern {pattern:?} has no named capture groups"),
            });
        }
        Ok(Self { pattern: compiled })
    }
}

impl LogParser for RegexLineParser {
    fn parse_line(&self, line: &str) -> Option<LogRecord> {
        let captures = self.pattern.captures(line)?;
        let mut record = LogRecord::new();
        for name in self.pattern.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                record.insert(name.to_string(), value.as_str().to_string());
            }
        }
        Some(record)
    }

    fn post_process(&self, record: &mut LogRecord) {
        if let Some(date) = record.get("Date")
            && let Some(normalized) = normalize_date(date)
        {
            record.insert("Date".to_string(), normalized);
        }
    }
}

/// Zero-pad a `Y-M-D` date so its lexicographic order is chronological.
/// Returns `None` when the value is not a dash-separated date.
#[must_use]
pub fn normalize_date(raw: &str) -> Option<String> {
    let mut parts = raw.split('-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if !(year.len() <= 4 && month.len() <= 2 && day.len() <= 2)
        || [year, month, day]
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    Some(format!("{year:0>4}-{month:0>2}-{day:0>2}"))
}

/// Numeric value of a field: the leading decimal digits, 0 when there are
/// none. Matches the permissive coercion log fields have historically had
/// (`"1234 bytes"` → 1234, `"-"` → 0).
#[must_use]
pub fn numeric_prefix(raw: &str) -> u64 {
    let digits: &str = {
        let end = raw
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(raw.len());
        &raw[..end]
    };
    digits.parse::<u64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_PATTERN: &str = r"^(?P<Date>\d{4}-\d{2}-\d{2}) (?P<Time>\d{2}:\d{2}:\d{2}) (?P<Host>\S+) (?P<Status>\d{3}) size=(?P<Size>\d+)";

    fn parser() -> RegexLineParser {
        RegexLineParser::new(ACCESS_PATTERN).expect("pattern should compile")
    }

    #[test]
    fn parses_matching_line_into_named_fields() {
        let record = parser()
            .parse_line("2024-05-01 10:05:00 example.com 200 size=100")
            .expect("line should parse");
        assert_eq!(record["Date"], "2024-05-01");
        assert_eq!(record["Time"], "10:05:00");
        assert_eq!(record["Host"], "example.com");
        assert_eq!(record["Size"], "100");
    }

    #[test]
    fn non_matching_line_yields_none() {
        assert!(parser().parse_line("-- malformed --").is_none());
    }

    #[test]
    fn rejects_pattern_without_named_groups() {
        let err = RegexLineParser::new(r"^\d+ \S+$").expect_err("should be rejected");
        assert_eq!(err.code(), "LSH-1001");
    }

    #[test]
    fn rejects_invalid_pattern() {
        let err = RegexLineParser::new(r"(?P<Date>[").expect_err("should be rejected");
        assert_eq!(err.code(), "LSH-1001");
    }

    #[test]
    fn post_process_zero_pads_dates() {
        let p = parser();
        let mut record = LogRecord::new();
        record.insert("Date".to_string(), "2024-5-1".to_string());
        record.insert("Time".to_string(), "10:05:00".to_string());
        p.post_process(&mut record);
        assert_eq!(record["Date"], "2024-05-01");
        assert_eq!(record["Time"], "10:05:00");
    }

    #[test]
    fn normalize_date_rejects_non_dates() {
        assert_eq!(normalize_date("May 1st"), None);
        assert_eq!(normalize_date("2024-05"), None);
        assert_eq!(normalize_date("2024-05-01-extra"), None);
        assert_eq!(normalize_date(""), None);
        assert_eq!(
            normalize_date("2024-05-01"),
            Some("2024-05-01".to_string())
        );
    }

    #[test]
    fn numeric_prefix_coercion() {
        assert_eq!(numeric_prefix("1234"), 1234);
        assert_eq!(numeric_prefix("1234 bytes"), 1234);
        assert_eq!(numeric_prefix("abc"), 0);
        assert_eq!(numeric_prefix(""), 0);
        assert_eq!(numeric_prefix("007"), 7);
    }
}
