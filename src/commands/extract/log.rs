use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::model::{ExtractionLogEntry, ExtractionLogFile};
use crate::util::{now_utc_string, read_json, write_json_pretty};

pub const EXTRACTION_LOG_NAME: &str = "extraction_log.json";
const LOG_VERSION: u32 = 1;

/// Append-only audit log of extraction attempts.
///
/// Opened at run start with whatever earlier runs recorded, appended to by the
/// single coordinating thread, and written in one atomic replace by
/// [`ExtractionLog::flush`]. A run that dies before flushing leaves the
/// previous log untouched.
#[derive(Debug)]
pub struct ExtractionLog {
    path: PathBuf,
    entries: Vec<ExtractionLogEntry>,
    prior_len: usize,
}

impl ExtractionLog {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let file: ExtractionLogFile = read_json(path)?;
            file.entries
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            prior_len: entries.len(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, entry: ExtractionLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ExtractionLogEntry] {
        &self.entries
    }

    /// Entries added since the log was opened.
    pub fn appended(&self) -> &[ExtractionLogEntry] {
        &self.entries[self.prior_len..]
    }

    /// Most recent entry per document id.
    pub fn latest_by_document(&self) -> HashMap<&str, &ExtractionLogEntry> {
        let mut latest = HashMap::new();
        for entry in &self.entries {
            latest.insert(entry.document_id.as_str(), entry);
        }
        latest
    }

    /// True when the latest attempt for this id succeeded on the same source bytes.
    pub fn is_completed(&self, document_id: &str, sha256: &str) -> bool {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.document_id == document_id)
            .is_some_and(|entry| entry.success && entry.sha256 == sha256)
    }

    pub fn flush(self) -> Result<PathBuf> {
        let appended = self.appended().len();
        let file = ExtractionLogFile {
            log_version: LOG_VERSION,
            updated_at: now_utc_string(),
            entries: self.entries,
        };
        write_json_pretty(&self.path, &file)?;

        info!(
            path = %self.path.display(),
            entries = file.entries.len(),
            appended,
            "flushed extraction log"
        );
        Ok(self.path)
    }
}
