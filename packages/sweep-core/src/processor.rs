//! Streaming filter-and-mutate consumer.
//!
//! Reads an inventory as a pull-based stream, applies an action's predicate
//! to each record, and performs one remote call per selected record, never
//! more than one in flight. The audit log gets exactly one line per selected
//! record, in input order; records the predicate rejects leave no trace.
//! Record-level failures are counted and logged, never escalated; only a
//! missing or malformed inventory aborts the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use cms_client::{RateBudget, Record};

use crate::audit::{AuditLog, Outcome, OutcomeStatus};
use crate::error::Result;
use crate::inventory::InventoryReader;
use crate::throttle::Throttle;

/// One mutation target: which records it applies to, how to call the
/// remote, and how its audit lines are shaped.
#[async_trait]
pub trait RecordAction: Send + Sync {
    /// The selection predicate. Rejected records are skipped silently.
    fn selects(&self, record: &Record) -> bool;

    /// Key used to skip records already acted on this run. `None` disables
    /// deduplication for this action.
    fn dedupe_key(&self, record: &Record) -> Option<String> {
        Some(record.id.clone())
    }

    /// Perform the single remote call for this record.
    async fn apply(&self, record: &Record) -> cms_client::Result<RateBudget>;

    /// Status recorded on success: `deleted` for destructive actions,
    /// `success` for modifications.
    fn success_status(&self) -> OutcomeStatus {
        OutcomeStatus::Deleted
    }

    /// Build the audit line for this record. Actions override this to add
    /// their extra fields (operating site, canonical owner, section name).
    fn outcome(&self, record: &Record, status: OutcomeStatus) -> Outcome {
        Outcome::new(record.id.clone(), status)
    }
}

/// Counters for one processor run. Function-local, returned to the caller;
/// nothing survives the run.
#[derive(Debug)]
pub struct BatchReport {
    /// Records the predicate selected (including duplicates).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duplicated: usize,
    pub log_path: PathBuf,
}

/// Run `action` over every record in the inventory at `inventory_path`,
/// appending one outcome line per selected record to a fresh audit log
/// named `<log_prefix>-<run-stamp>.jsonl` under `report_dir`.
pub async fn run_batch(
    inventory_path: &Path,
    action: &dyn RecordAction,
    report_dir: &Path,
    log_prefix: &str,
    throttle: &Throttle,
) -> Result<BatchReport> {
    // Open the inventory before creating the log: a missing file must abort
    // without leaving any partial state behind.
    let mut reader = InventoryReader::open(inventory_path)?;
    let mut log = AuditLog::create(report_dir, log_prefix)?;
    tracing::info!(
        inventory = %inventory_path.display(),
        log = %log.path().display(),
        "batch started"
    );

    let mut seen: HashSet<String> = HashSet::new();
    let mut report = BatchReport {
        processed: 0,
        succeeded: 0,
        failed: 0,
        duplicated: 0,
        log_path: log.path().to_path_buf(),
    };

    while let Some(record) = reader.next_record()? {
        if !action.selects(&record) {
            continue;
        }
        report.processed += 1;

        if let Some(key) = action.dedupe_key(&record) {
            if !seen.insert(key) {
                report.duplicated += 1;
                tracing::debug!(id = %record.id, "duplicate, skipping");
                log.append(&action.outcome(&record, OutcomeStatus::Duplicated))?;
                continue;
            }
        }

        match action.apply(&record).await {
            Ok(budget) => {
                report.succeeded += 1;
                tracing::info!(id = %record.id, "record processed");
                log.append(&action.outcome(&record, action.success_status()))?;
                throttle.respect(&budget).await;
            }
            Err(err) => {
                report.failed += 1;
                let detail = err.to_string();
                tracing::error!(id = %record.id, error = %detail, "mutation failed");
                log.append(
                    &action
                        .outcome(&record, OutcomeStatus::Error)
                        .with_error(Some(detail)),
                )?;
                tokio::time::sleep(throttle.failure_penalty).await;
            }
        }

        tokio::time::sleep(throttle.per_record).await;
    }

    tracing::info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        duplicated = report.duplicated,
        "batch finished"
    );
    Ok(report)
}
