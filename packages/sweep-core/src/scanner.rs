//! Paginated scan-to-file producer.
//!
//! Walks the CMS scrolling search endpoint page by page and appends every
//! returned record to an [`InventoryWriter`](crate::inventory::InventoryWriter)
//! as it arrives, so memory stays bounded by the page size. A 429 means wait
//! and retry the same cursor, for as long as it takes; a scan is about
//! completeness, and the caller can always impose an outer timeout. Any
//! other failure stops the scan and keeps the partial file, which the writer
//! guarantees is still valid JSON.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use cms_client::{CmsClient, RateBudget, ScanPage, ScanQuery};

use crate::error::Result;
use crate::inventory::InventoryWriter;
use crate::throttle::Throttle;

/// One page fetch against the scrolling search endpoint.
///
/// A trait so tests can drive the scanner against a scripted remote.
#[async_trait]
pub trait ScanSource: Send + Sync {
    async fn fetch(&self, scroll_id: Option<&str>) -> cms_client::Result<(ScanPage, RateBudget)>;
}

/// The real scan source: one website's content, filtered by record kind.
pub struct CmsScan {
    client: CmsClient,
    website: String,
    query: ScanQuery,
    page_size: u32,
}

impl CmsScan {
    pub fn new(client: CmsClient, website: impl Into<String>, kinds: &[&str]) -> Self {
        Self {
            client,
            website: website.into(),
            query: ScanQuery::any_of_types(kinds),
            page_size: 100,
        }
    }
}

#[async_trait]
impl ScanSource for CmsScan {
    async fn fetch(&self, scroll_id: Option<&str>) -> cms_client::Result<(ScanPage, RateBudget)> {
        self.client
            .scan(&self.website, &self.query, scroll_id, self.page_size)
            .await
    }
}

#[derive(Debug)]
pub struct ScanSummary {
    pub path: PathBuf,
    pub total: usize,
    /// False when the scan stopped early on a non-retryable failure. The
    /// file is a valid (partial) inventory either way.
    pub complete: bool,
}

/// Run a scan to completion, writing every record into a fresh inventory
/// file under `report_dir`.
pub async fn scan_to_file(
    source: &dyn ScanSource,
    report_dir: &Path,
    throttle: &Throttle,
) -> Result<ScanSummary> {
    let mut writer = InventoryWriter::create(report_dir)?;
    tracing::info!(path = %writer.path().display(), "scan started");

    let mut scroll_id: Option<String> = None;
    let mut total = 0usize;
    let mut complete = true;

    loop {
        let (page, budget) = match source.fetch(scroll_id.as_deref()).await {
            Ok(result) => result,
            Err(err) if err.is_rate_limited() => {
                tracing::warn!(
                    cooldown_secs = throttle.page_cooldown.as_secs(),
                    "scan page rejected by rate limiter, retrying"
                );
                tokio::time::sleep(throttle.page_cooldown).await;
                continue;
            }
            Err(err) => {
                tracing::error!(error = %err, "scan stopped, keeping partial inventory");
                complete = false;
                break;
            }
        };

        if page.content_elements.is_empty() {
            break;
        }

        for record in &page.content_elements {
            writer.append(record)?;
        }
        total += page.content_elements.len();
        tracing::info!(page_records = page.content_elements.len(), total, "scan page written");

        match page.next {
            Some(next) => scroll_id = Some(next),
            None => break,
        }

        throttle.respect(&budget).await;
    }

    let (path, written) = writer.finish()?;
    tracing::info!(total = written, path = %path.display(), "scan finished");
    Ok(ScanSummary {
        path,
        total,
        complete,
    })
}
