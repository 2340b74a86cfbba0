//! Scans a folder for log files and turns their lines into log entries.
//!
//! Structured lines look like
//! `2024-01-15 10:30:45.123 | ERROR | message` (the `|` separators are
//! optional, the millisecond separator may be `.`, `,` or `:`). Any other
//! line is recorded as `INFO` at collection time. Files already collected are
//! skipped unless they were modified within the recent window.

use crate::core::log::NewLogEntry;
use crate::errors::Result;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions treated as log files (lower-case, without the dot)
pub const LOG_EXTENSIONS: [&str; 3] = ["log", "txt", "csv"];

/// Collected files modified within this window are read again
pub const RECENT_WINDOW: Duration = Duration::from_secs(5 * 60);

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?<timestamp>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}[,.:]\d{3})\s*\|?\s*(?<level>\w+)\s*\|?\s*(?<message>.*)",
    )
    .unwrap_or_else(|e| unreachable!("invalid log line pattern: {e}"))
});

/// Parses `YYYY-MM-DD HH:MM:SS?mmm` in local time.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let (head, millis) = raw.split_at(raw.len().checked_sub(3)?);
    let head = head.get(..head.len().checked_sub(1)?)?;
    let naive = NaiveDateTime::parse_from_str(&format!("{head}.{millis}"), "%Y-%m-%d %H:%M:%S%.3f")
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Converts one line of `source` into a log entry.
#[must_use]
pub fn parse_line(line: &str, source: &str) -> NewLogEntry {
    let structured = LINE_PATTERN.captures(line).and_then(|caps| {
        let timestamp = parse_timestamp(&caps["timestamp"])?;
        Some((timestamp, caps["level"].to_string(), caps["message"].to_string()))
    });

    let (timestamp, level, message) =
        structured.unwrap_or_else(|| (Utc::now(), "INFO".to_string(), line.to_string()));

    NewLogEntry {
        log_level: Some(level),
        message,
        source: Some(source.to_string()),
        raw_data: Some(line.to_string()),
        log_timestamp: Some(timestamp),
        ..Default::default()
    }
}

fn has_log_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LOG_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Remembers which files were collected between scans
#[derive(Debug)]
pub struct LogCollector {
    processed: HashSet<PathBuf>,
    recent_window: Duration,
}

impl Default for LogCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LogCollector {
    /// Creates a collector with the default five-minute window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_recent_window(RECENT_WINDOW)
    }

    /// Creates a collector with a custom re-read window.
    #[must_use]
    pub fn with_recent_window(recent_window: Duration) -> Self {
        Self {
            processed: HashSet::new(),
            recent_window,
        }
    }

    fn recently_modified(&self, path: &Path) -> bool {
        let Some(threshold) = SystemTime::now().checked_sub(self.recent_window) else {
            return true;
        };
        modified(path).is_none_or(|time| time > threshold)
    }

    /// Log files under `folder` due for collection, oldest first.
    pub fn pending_files(&self, folder: &Path) -> Vec<PathBuf> {
        let mut files: Vec<(Option<SystemTime>, PathBuf)> = WalkDir::new(folder)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| has_log_extension(path))
            .filter(|path| !self.processed.contains(path) || self.recently_modified(path))
            .map(|path| (modified(&path), path))
            .collect();

        files.sort();
        files.into_iter().map(|(_, path)| path).collect()
    }

    /// Reads every due file under `folder` and returns its entries.
    ///
    /// Unreadable files are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if `folder` does not exist.
    pub fn collect(&mut self, folder: &Path) -> Result<Vec<NewLogEntry>> {
        if !folder.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Log folder does not exist: {}", folder.display()),
            )
            .into());
        }

        let files = self.pending_files(folder);
        let mut entries = Vec::new();

        for path in &files {
            let content = match std::fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read log file");
                    continue;
                }
            };
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let before = entries.len();
            entries.extend(
                content
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| parse_line(line, &source)),
            );
            debug!(path = %path.display(), count = entries.len() - before, "Read log file");
            self.processed.insert(path.clone());
        }

        if !entries.is_empty() {
            info!(count = entries.len(), files = files.len(), "Collected log entries");
        }
        Ok(entries)
    }
}
