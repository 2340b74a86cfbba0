//! File backup to an FTP server.
//!
//! Files under the source folder matching any of the `;`-separated glob
//! patterns are uploaded one by one, keeping their relative paths below the
//! remote directory. Existing remote files are overwritten. Progress is sent
//! on a channel after every file; cancellation is checked between files.

use crate::config::agent::{BackupSettings, FtpSettings};
use crate::errors::{Error, Result};
use chrono::{DateTime, Local, NaiveDate};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file selected for backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    /// Absolute local path
    pub path: PathBuf,
    /// Path relative to the source folder, `/`-separated
    pub relative: String,
    /// Size in bytes
    pub size: u64,
}

/// Progress report sent after each uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupProgress {
    /// 0..=100, by bytes
    pub percent: u8,
    /// Human-readable status
    pub status: String,
    /// File just uploaded
    pub current_file: Option<String>,
    pub files_processed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

/// Totals of an upload run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub files_processed: usize,
    pub bytes_processed: u64,
    pub cancelled: bool,
}

impl UploadOutcome {
    /// A backup succeeded when it ran to the end and uploaded something.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        !self.cancelled && self.files_processed > 0
    }
}

/// The FTP operations a backup needs
pub trait FtpTransport {
    /// Creates `dir` (absolute, `/`-separated) and its parents if missing.
    fn ensure_dir(&mut self, dir: &str) -> Result<()>;
    /// Uploads `local` to `remote`, replacing any existing file.
    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64>;
    /// Closes the session.
    fn quit(&mut self) -> Result<()>;
}

/// [`FtpTransport`] over a plain FTP session
pub struct SuppaFtp {
    stream: FtpStream,
    created: HashSet<String>,
}

impl SuppaFtp {
    /// Connects and logs in, switching to binary transfers.
    ///
    /// # Errors
    /// Returns an error if the host is empty, the connection fails, or the
    /// login is rejected.
    pub fn connect(settings: &FtpSettings) -> Result<Self> {
        if settings.host.trim().is_empty() {
            return Err(Error::Config {
                message: "FTP host is not configured".to_string(),
            });
        }
        let mut stream = FtpStream::connect((settings.host.as_str(), settings.port))?;
        stream.login(&settings.username, &settings.password)?;
        stream.transfer_type(FileType::Binary)?;
        debug!(host = %settings.host, port = settings.port, "FTP session opened");

        Ok(Self {
            stream,
            created: HashSet::new(),
        })
    }
}

impl FtpTransport for SuppaFtp {
    fn ensure_dir(&mut self, dir: &str) -> Result<()> {
        let mut partial = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            partial.push('/');
            partial.push_str(part);
            if self.created.insert(partial.clone()) {
                // Fails when the directory exists already
                if let Err(e) = self.stream.mkdir(&partial) {
                    debug!(dir = %partial, error = %e, "mkdir skipped");
                }
            }
        }
        Ok(())
    }

    fn upload(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let mut file = std::fs::File::open(local)?;
        Ok(self.stream.put_file(remote, &mut file)?)
    }

    fn quit(&mut self) -> Result<()> {
        Ok(self.stream.quit()?)
    }
}

fn parse_patterns(patterns: &str) -> Result<Vec<Pattern>> {
    patterns
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::Config {
                message: format!("Invalid backup pattern '{p}': {e}"),
            })
        })
        .collect()
}

fn changed_since(metadata: &std::fs::Metadata, from: NaiveDate) -> bool {
    let Some(start) = from
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
    else {
        return true;
    };
    [metadata.modified(), metadata.created()]
        .into_iter()
        .filter_map(std::result::Result::ok)
        .any(|time| DateTime::<Local>::from(time) >= start)
}

/// Lists files under `source` matching `patterns`, sorted by relative path.
///
/// With `from`, only files created or modified on or after that day are kept.
///
/// # Errors
/// Returns an error if the folder does not exist or a pattern is invalid.
pub fn find_backup_files(
    source: &Path,
    patterns: &str,
    recursive: bool,
    from: Option<NaiveDate>,
) -> Result<Vec<BackupFile>> {
    if !source.is_dir() {
        return Err(Error::Config {
            message: format!("Backup source does not exist: {}", source.display()),
        });
    }
    let patterns = parse_patterns(patterns)?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let mut walker = WalkDir::new(source).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !patterns.iter().any(|p| p.matches_with(&name, options)) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if from.is_some_and(|day| !changed_since(&metadata, day)) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(BackupFile {
            path: entry.path().to_path_buf(),
            relative,
            size: metadata.len(),
        });
    }
    Ok(files)
}

fn remote_path(remote_dir: &str, relative: &str) -> String {
    let base = remote_dir.trim_end_matches('/');
    format!("{base}/{relative}")
}

fn parent_dir(remote: &str) -> Option<&str> {
    remote.rsplit_once('/').map(|(dir, _)| dir).filter(|d| !d.is_empty())
}

/// Uploads `files` sequentially, reporting progress after each one.
///
/// A failed upload is logged and skipped.
///
/// # Errors
/// Returns an error only if the remote base directory cannot be created.
pub fn upload_files<T: FtpTransport + ?Sized>(
    transport: &mut T,
    remote_dir: &str,
    files: &[BackupFile],
    progress: &UnboundedSender<BackupProgress>,
    cancel: &CancellationToken,
) -> Result<UploadOutcome> {
    let total_files = files.len();
    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    let mut outcome = UploadOutcome {
        files_processed: 0,
        bytes_processed: 0,
        cancelled: false,
    };

    transport.ensure_dir(remote_dir)?;

    for file in files {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            info!(
                files_processed = outcome.files_processed,
                total_files, "Backup cancelled"
            );
            break;
        }

        let remote = remote_path(remote_dir, &file.relative);
        if let Some(dir) = parent_dir(&remote) {
            transport.ensure_dir(dir)?;
        }
        if let Err(e) = transport.upload(&file.path, &remote) {
            warn!(path = %file.path.display(), error = %e, "Failed to upload file");
            continue;
        }

        outcome.files_processed += 1;
        outcome.bytes_processed += file.size;
        debug!(path = %file.path.display(), %remote, "Uploaded file");

        let percent = if total_bytes == 0 {
            100
        } else {
            u8::try_from(outcome.bytes_processed.saturating_mul(100) / total_bytes).unwrap_or(100)
        };
        // The receiver may have gone away; the backup continues regardless.
        let _ = progress.send(BackupProgress {
            percent,
            status: format!("Uploaded {}", file.relative),
            current_file: Some(file.relative.clone()),
            files_processed: outcome.files_processed,
            total_files,
            bytes_processed: outcome.bytes_processed,
            total_bytes,
        });
    }

    Ok(outcome)
}

/// Runs a full backup on a blocking thread.
///
/// Returns `true` only if the run was not cancelled and at least one file
/// was uploaded.
///
/// # Errors
/// Returns an error if the source folder or patterns are invalid, or the FTP
/// connection fails.
pub async fn run_backup(
    ftp: &FtpSettings,
    backup: &BackupSettings,
    from: Option<NaiveDate>,
    progress: UnboundedSender<BackupProgress>,
    cancel: CancellationToken,
) -> Result<bool> {
    let source = backup.source.clone().ok_or_else(|| Error::Config {
        message: "Backup source folder is not configured".to_string(),
    })?;
    let files = find_backup_files(&source, &backup.patterns, backup.recursive, from)?;
    if files.is_empty() {
        warn!(patterns = %backup.patterns, ?from, "No files found to back up");
        return Ok(false);
    }
    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    info!(files = files.len(), total_bytes, ?from, "Starting backup");

    let ftp = ftp.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<UploadOutcome> {
        let _ = progress.send(BackupProgress {
            percent: 0,
            status: "Connecting to FTP server...".to_string(),
            current_file: None,
            files_processed: 0,
            total_files: files.len(),
            bytes_processed: 0,
            total_bytes,
        });
        let mut session = SuppaFtp::connect(&ftp)?;
        let outcome = upload_files(&mut session, &ftp.remote_dir, &files, &progress, &cancel)?;
        if let Err(e) = session.quit() {
            debug!(error = %e, "FTP quit failed");
        }
        Ok(outcome)
    })
    .await??;

    info!(
        files_processed = outcome.files_processed,
        bytes_processed = outcome.bytes_processed,
        cancelled = outcome.cancelled,
        "Backup finished"
    );
    Ok(outcome.succeeded())
}

/// Checks that the FTP server accepts the configured login.
pub async fn test_connection(ftp: &FtpSettings) -> bool {
    let ftp = ftp.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut session = SuppaFtp::connect(&ftp)?;
        session.quit()
    })
    .await;

    match result {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "FTP connection test failed");
            false
        }
        Err(e) => {
            warn!(error = %e, "FTP connection test did not complete");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FakeFtp {
        dirs: Vec<String>,
        uploads: Vec<String>,
        fail_on: Option<String>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl FtpTransport for FakeFtp {
        fn ensure_dir(&mut self, dir: &str) -> Result<()> {
            if !self.dirs.iter().any(|d| d == dir) {
                self.dirs.push(dir.to_string());
            }
            Ok(())
        }

        fn upload(&mut self, local: &Path, remote: &str) -> Result<u64> {
            if self.fail_on.as_deref() == Some(remote) {
                return Err(Error::validation("550 Permission denied"));
            }
            self.uploads.push(remote.to_string());
            if let Some((after, token)) = &self.cancel_after {
                if self.uploads.len() == *after {
                    token.cancel();
                }
            }
            Ok(std::fs::metadata(local)?.len())
        }

        fn quit(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn sample_tree() -> Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("2024"))?;
        std::fs::write(dir.path().join("a.log"), "aaaa")?;
        std::fs::write(dir.path().join("b.csv"), "bbbbbb")?;
        std::fs::write(dir.path().join("skip.bmp"), "x")?;
        std::fs::write(dir.path().join("2024").join("c.LOG"), "cc")?;
        Ok(dir)
    }

    #[test]
    fn test_find_files_by_patterns() -> Result<()> {
        let dir = sample_tree()?;

        let files = find_backup_files(dir.path(), "*.log; *.csv", true, None)?;
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["2024/c.LOG", "a.log", "b.csv"]);

        let flat = find_backup_files(dir.path(), "*.log", false, None)?;
        assert_eq!(flat.len(), 1);
        Ok(())
    }

    #[test]
    fn test_find_files_from_date() -> Result<()> {
        let dir = sample_tree()?;
        let tomorrow = Local::now().date_naive().succ_opt().unwrap();
        assert!(find_backup_files(dir.path(), "*.*", true, Some(tomorrow))?.is_empty());

        let today = Local::now().date_naive();
        assert_eq!(find_backup_files(dir.path(), "*.*", true, Some(today))?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_missing_source_is_error() {
        assert!(find_backup_files(Path::new("/no/such/dir"), "*.*", true, None).is_err());
    }

    #[test]
    fn test_upload_reports_progress() -> Result<()> {
        let dir = sample_tree()?;
        let files = find_backup_files(dir.path(), "*.log;*.csv", true, None)?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ftp = FakeFtp::default();

        let outcome = upload_files(&mut ftp, "/backup/", &files, &tx, &CancellationToken::new())?;
        assert!(outcome.succeeded());
        assert_eq!(outcome.files_processed, 3);
        assert_eq!(outcome.bytes_processed, 12);
        assert_eq!(
            ftp.uploads,
            vec!["/backup/2024/c.LOG", "/backup/a.log", "/backup/b.csv"]
        );
        assert!(ftp.dirs.contains(&"/backup/2024".to_string()));

        let mut last = None;
        while let Ok(p) = rx.try_recv() {
            last = Some(p);
        }
        let last = last.unwrap();
        assert_eq!(last.percent, 100);
        assert_eq!(last.files_processed, 3);
        assert_eq!(last.current_file.as_deref(), Some("b.csv"));
        Ok(())
    }

    #[test]
    fn test_failed_upload_is_skipped() -> Result<()> {
        let dir = sample_tree()?;
        let files = find_backup_files(dir.path(), "*.log", true, None)?;
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut ftp = FakeFtp {
            fail_on: Some("/up/a.log".to_string()),
            ..Default::default()
        };

        let outcome = upload_files(&mut ftp, "/up", &files, &tx, &CancellationToken::new())?;
        assert_eq!(outcome.files_processed, 1);
        assert!(outcome.succeeded());
        Ok(())
    }

    #[test]
    fn test_cancel_stops_between_files() -> Result<()> {
        let dir = sample_tree()?;
        let files = find_backup_files(dir.path(), "*.*", true, None)?;
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut ftp = FakeFtp {
            cancel_after: Some((1, cancel.clone())),
            ..Default::default()
        };

        let outcome = upload_files(&mut ftp, "/up", &files, &tx, &cancel)?;
        assert_eq!(ftp.uploads.len(), 1);
        assert!(outcome.cancelled);
        assert!(!outcome.succeeded());
        Ok(())
    }

    #[test]
    fn test_nothing_uploaded_is_not_success() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut ftp = FakeFtp::default();
        let outcome = upload_files(&mut ftp, "/up", &[], &tx, &CancellationToken::new())?;
        assert!(!outcome.succeeded());
        Ok(())
    }

    #[tokio::test]
    async fn test_connection_without_host_fails() {
        assert!(!test_connection(&FtpSettings::default()).await);
    }
}
