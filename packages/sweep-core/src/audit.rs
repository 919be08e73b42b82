//! Append-only audit trail, one JSON object per line.
//!
//! Every processed record gets exactly one line describing what happened to
//! it. Lines are flushed as they are written, so a run killed mid-flight
//! leaves a log that is valid up to the last complete line. Each run gets a
//! fresh, timestamp-named file; earlier logs are never overwritten.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The record itself was deleted.
    Deleted,
    /// The mutation succeeded without deleting the record (de-circulation).
    Success,
    /// The remote call failed; details in `error`.
    Error,
    /// Same dedupe key already acted on this run; no call was made.
    Duplicated,
    /// Explicitly skipped.
    Skipped,
}

/// One audit-log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    pub fn new(id: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            id: id.into(),
            status,
            website_id: None,
            canonical_website: None,
            name: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website_id = Some(website.into());
        self
    }

    pub fn with_canonical(mut self, canonical: Option<String>) -> Self {
        self.canonical_website = canonical;
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

/// Run-stamped JSONL writer. `T` is the line type.
#[derive(Debug)]
pub struct JsonlLog<T> {
    writer: BufWriter<File>,
    path: PathBuf,
    _line: PhantomData<T>,
}

/// The audit log proper: one [`Outcome`] per line.
pub type AuditLog = JsonlLog<Outcome>;

impl<T: Serialize> JsonlLog<T> {
    /// Create `<dir>/<prefix>-<epoch-millis>.jsonl`, creating `dir` first if
    /// needed.
    pub fn create(dir: &Path, prefix: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let stamp = Utc::now().timestamp_millis();
        let path = dir.join(format!("{prefix}-{stamp}.jsonl"));
        let file = File::options().create_new(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            _line: PhantomData,
        })
    }

    /// Append one line and flush it to disk.
    pub fn append(&mut self, line: &T) -> Result<()> {
        let json = serde_json::to_string(line).map_err(crate::error::SweepError::Parse)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
