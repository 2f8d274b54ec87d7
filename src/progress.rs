//! Reconcile and embed progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. Human output is the default on a TTY; `--progress json`
//! emits one JSON object per line.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A collection walk has started; the file total is not yet known.
    Scanning { collection: String },
    /// Reconciling: n files visited out of total.
    Indexing {
        collection: String,
        n: u64,
        total: u64,
    },
    /// Embedding backfill: n content hashes processed out of total.
    Embedding { n: u64, total: u64 },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: "update notes  indexing  1,234 / 5,000 files".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Scanning { collection } => {
                format!("update {}  scanning...\n", collection)
            }
            ProgressEvent::Indexing {
                collection,
                n,
                total,
            } => format!(
                "update {}  indexing  {} / {} files\n",
                collection,
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Embedding { n, total } => format!(
                "embed  {} / {} documents\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Scanning { collection } => serde_json::json!({
                "event": "progress",
                "phase": "scanning",
                "collection": collection
            }),
            ProgressEvent::Indexing {
                collection,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "collection": collection,
                "n": n,
                "total": total
            }),
            ProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` flag value; `auto` (or anything else) uses
    /// TTY detection.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("off") => ProgressMode::Off,
            Some("human") => ProgressMode::Human,
            Some("json") => ProgressMode::Json,
            _ => Self::default_for_tty(),
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn from_flag_parses_modes() {
        assert_eq!(ProgressMode::from_flag(Some("off")), ProgressMode::Off);
        assert_eq!(ProgressMode::from_flag(Some("human")), ProgressMode::Human);
        assert_eq!(ProgressMode::from_flag(Some("json")), ProgressMode::Json);
    }
}
