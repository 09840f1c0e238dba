//! Log domain types

use chrono::{DateTime, SecondsFormat, Utc};

/// Persisted log line layout: `[<RFC 3339 timestamp>] <message>`
pub struct LogLine;

impl LogLine {
    /// Render a message as a single persisted line (without trailing newline)
    ///
    /// Line breaks inside the message are flattened to spaces so that one
    /// message always maps to exactly one line.
    pub fn format(timestamp: DateTime<Utc>, message: &str) -> String {
        let flat: String = message
            .trim_end_matches(['\r', '\n'])
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();

        format!(
            "[{}] {}",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            flat
        )
    }

    /// Split a persisted line back into its timestamp and message
    pub fn parse(line: &str) -> Option<(DateTime<Utc>, &str)> {
        let rest = line.strip_prefix('[')?;
        let (stamp, message) = rest.split_once("] ")?;
        let timestamp = DateTime::parse_from_rfc3339(stamp).ok()?;
        Some((timestamp.with_timezone(&Utc), message))
    }
}
