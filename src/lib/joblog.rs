//! Per-job log file and stage bookkeeping.
//!
//! A [`JobLog`] is created at the start of every job. It writes a timestamped header
//! followed by one line per event, and forwards every event to the `log` facade so the
//! same messages reach the terminal. Writing to the file is best effort: once a write
//! fails the log keeps collecting stage outcomes and forwarding events, but stops
//! touching the file.

use crate::MergeError;
use chrono::Local;
use log::{error, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Timestamp format of the log header
pub const HEADER_TIME_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

/// Result of one pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Ok,
    /// The stage failed and its input was passed through unchanged
    Degraded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub status: StageStatus,
    pub detail: String,
}

/// Returns `dir/<stem>.<ext>`, or `dir/<stem>_<n>.<ext>` with the smallest `n` that
/// does not exist yet
pub fn unique_name(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, ext));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[derive(Debug)]
pub struct JobLog {
    path: PathBuf,
    file: Option<File>,
    outcomes: Vec<StageOutcome>,
}

impl JobLog {
    /// Creates a new log file in `dir`, named `merge_log.txt` or `merge_log_<n>.txt`
    pub fn create(dir: &Path) -> Result<Self, MergeError> {
        fs::create_dir_all(dir).map_err(|e| MergeError::io(e, dir))?;
        let path = unique_name(dir, "merge_log", "txt");
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|e| MergeError::io(e, &path))?;
        let mut log = JobLog {
            path,
            file: Some(file),
            outcomes: Vec::new(),
        };
        let header = format!("{} - font merge started", Local::now().format(HEADER_TIME_FORMAT));
        log.write_line(&header);
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    fn write_line(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(file, "{}", line) {
            warn!("Failed to write to log file {:?}: {}", self.path, e);
            self.file = None;
        }
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.write_line(message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{}", message);
        self.write_line(&format!("[WARN] {}", message));
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!("{}", message);
        self.write_line(&format!("[ERROR] {}", message));
    }

    /// Records the outcome of `stage` and logs it at the matching level
    pub fn record(&mut self, stage: &'static str, status: StageStatus, detail: impl Into<String>) {
        let detail = detail.into();
        match status {
            StageStatus::Ok => self.info(format!("{}: {}", stage, detail)),
            StageStatus::Degraded => self.warn(format!("{} skipped: {}", stage, detail)),
            StageStatus::Failed => self.error(format!("{} failed: {}", stage, detail)),
        }
        self.outcomes.push(StageOutcome {
            stage,
            status,
            detail,
        });
    }

    /// Logs `err` followed by each error in its source chain
    pub fn error_chain(&mut self, err: &(dyn std::error::Error + 'static)) {
        self.error(err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            self.error(format!("caused by: {}", cause));
            source = cause.source();
        }
    }

    /// Flushes and closes the file, returning its path
    pub fn finish(mut self) -> PathBuf {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                warn!("Failed to flush log file {:?}: {}", self.path, e);
            }
        }
        self.path
    }
}
