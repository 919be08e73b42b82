//! Typed errors for the sweep library.
//!
//! Uses `thiserror` for library errors (not `anyhow`); the CLI wraps these
//! with context at the top level.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole run, as opposed to per-record failures, which
/// are recorded in the audit log and never escalate.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Inventory file does not exist; nothing was started.
    #[error("inventory not found: {}", path.display())]
    MissingInventory { path: PathBuf },

    /// Inventory file stopped being valid JSON mid-stream.
    #[error("inventory parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Reading or writing a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A remote call failed in a context where it cannot be recorded as a
    /// per-record outcome (section listing, site deletion).
    #[error(transparent)]
    Cms(#[from] cms_client::CmsError),
}

/// Result type alias for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;
