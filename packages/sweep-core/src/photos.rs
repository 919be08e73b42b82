//! Offset-paginated photo purge.
//!
//! Photos are not part of the content scan, so this sweep pages through the
//! photo API directly, `offset`/`limit` style, until an empty page comes
//! back. Dry-run is the default: the metadata of every photo that would be
//! deleted is written to a JSONL file and nothing is touched. Execute mode
//! deletes each photo and logs the same metadata for the ones actually
//! removed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use cms_client::{CmsClient, Photo, RateBudget};

use crate::audit::JsonlLog;
use crate::error::Result;
use crate::throttle::Throttle;

const PAGE_LIMIT: u32 = 50;

/// Photo listing and deletion, behind a trait for scripted tests.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn page(&self, offset: u32, limit: u32) -> cms_client::Result<(Vec<Photo>, RateBudget)>;
    async fn delete(&self, id: &str) -> cms_client::Result<RateBudget>;
}

/// The real photo source: one website's photo library.
pub struct CmsPhotos {
    client: CmsClient,
    website: String,
}

impl CmsPhotos {
    pub fn new(client: CmsClient, website: impl Into<String>) -> Self {
        Self {
            client,
            website: website.into(),
        }
    }
}

#[async_trait]
impl PhotoSource for CmsPhotos {
    async fn page(&self, offset: u32, limit: u32) -> cms_client::Result<(Vec<Photo>, RateBudget)> {
        self.client.list_photos(&self.website, offset, limit).await
    }

    async fn delete(&self, id: &str) -> cms_client::Result<RateBudget> {
        self.client.delete_photo(id).await
    }
}

/// One line in the purge log: the metadata worth keeping about a photo
/// that was (or would be) deleted.
#[derive(Debug, Serialize)]
struct PhotoLogEntry<'a> {
    id: &'a str,
    #[serde(rename = "originalName")]
    original_name: Option<&'a str>,
    caption: Option<&'a str>,
    created_date: Option<&'a str>,
    updated_date: Option<&'a str>,
}

impl<'a> PhotoLogEntry<'a> {
    fn from(photo: &'a Photo) -> Self {
        Self {
            id: &photo.id,
            original_name: photo.original_name.as_deref(),
            caption: photo.caption.as_deref(),
            created_date: photo.created_date.as_deref(),
            updated_date: photo.updated_date.as_deref(),
        }
    }
}

#[derive(Debug)]
pub struct PurgeSummary {
    /// Photos seen across all pages.
    pub processed: usize,
    /// Photos actually deleted (always zero in dry-run).
    pub deleted: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub log_path: PathBuf,
}

/// Page through every photo of the site and delete them, or just inventory
/// them when `execute` is false.
pub async fn purge_photos(
    source: &dyn PhotoSource,
    report_dir: &Path,
    execute: bool,
    throttle: &Throttle,
) -> Result<PurgeSummary> {
    let prefix = if execute { "deleted_photos" } else { "dryrun_photos" };
    let mut log: JsonlLog<serde_json::Value> = JsonlLog::create(report_dir, prefix)?;
    let mut summary = PurgeSummary {
        processed: 0,
        deleted: 0,
        failed: 0,
        dry_run: !execute,
        log_path: log.path().to_path_buf(),
    };

    let mut offset = 0u32;
    loop {
        let photos = match source.page(offset, PAGE_LIMIT).await {
            Ok((photos, _)) => photos,
            Err(err) => {
                tracing::error!(offset, error = %err, "photo listing failed, stopping");
                break;
            }
        };
        if photos.is_empty() {
            break;
        }

        for photo in &photos {
            summary.processed += 1;
            let entry = serde_json::to_value(PhotoLogEntry::from(photo))
                .map_err(crate::error::SweepError::Parse)?;

            if !execute {
                tracing::info!(id = %photo.id, "dry-run, would delete photo");
                log.append(&entry)?;
            } else {
                match source.delete(&photo.id).await {
                    Ok(budget) => {
                        summary.deleted += 1;
                        tracing::info!(id = %photo.id, "photo deleted");
                        log.append(&entry)?;
                        throttle.respect(&budget).await;
                    }
                    Err(err) => {
                        summary.failed += 1;
                        tracing::error!(id = %photo.id, error = %err, "photo delete failed");
                        tokio::time::sleep(throttle.failure_penalty).await;
                    }
                }
                tokio::time::sleep(throttle.per_record).await;
            }
        }

        offset += PAGE_LIMIT;
    }

    tracing::info!(
        processed = summary.processed,
        deleted = summary.deleted,
        dry_run = summary.dry_run,
        "photo purge finished"
    );
    Ok(summary)
}
