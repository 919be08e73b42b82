//! Read-only reports derived from an inventory.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use cms_client::Record;

use crate::error::{Result, SweepError};
use crate::inventory::InventoryReader;

/// One video in the report, boiled down to the fields an operator needs to
/// relocate it.
#[derive(Debug, Serialize)]
pub struct VideoSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub canonical_website: Option<String>,
    pub canonical_url: String,
    pub website_url: String,
    pub promo_image: String,
}

impl VideoSummary {
    fn from_record(record: &Record, website: &str) -> Self {
        Self {
            id: record.id.clone(),
            canonical_website: record.canonical_website.clone(),
            canonical_url: record.canonical_url.clone().unwrap_or_default(),
            website_url: record
                .websites
                .get(website)
                .and_then(|entry| entry.website_url.clone())
                .unwrap_or_default(),
            promo_image: record.promo_image_url().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug)]
pub struct VideosReport {
    pub path: PathBuf,
    pub count: usize,
}

/// Stream the inventory and write a simplified JSON report of every video
/// related to `website`, either canonically or through a circulation entry.
///
/// Returns `None` without creating a file when the inventory holds no such
/// videos.
pub fn videos_report(
    inventory_path: &Path,
    website: &str,
    report_dir: &Path,
) -> Result<Option<VideosReport>> {
    let reader = InventoryReader::open(inventory_path)?;

    let mut videos: Vec<VideoSummary> = Vec::new();
    for record in reader {
        let record = record?;
        let is_video = record.kind.as_deref() == Some("video");
        if is_video && (record.is_canonical_for(website) || record.circulates_on(website)) {
            videos.push(VideoSummary::from_record(&record, website));
        }
    }

    if videos.is_empty() {
        tracing::info!(website, "no videos related to this site");
        return Ok(None);
    }

    fs::create_dir_all(report_dir)?;
    let path = report_dir.join(format!("videos-{}.json", Utc::now().timestamp_millis()));
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, &videos).map_err(SweepError::Parse)?;
    writer.flush()?;

    tracing::info!(count = videos.len(), path = %path.display(), "videos report written");
    Ok(Some(VideosReport {
        path,
        count: videos.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_inventory(dir: &Path, records: &[serde_json::Value]) -> PathBuf {
        let path = dir.join("content_scan_results.json");
        fs::write(&path, serde_json::to_string_pretty(records).unwrap()).unwrap();
        path
    }

    #[test]
    fn keeps_only_videos_related_to_the_site() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = write_inventory(
            dir.path(),
            &[
                serde_json::json!({
                    "_id": "V1",
                    "type": "video",
                    "canonical_website": "site1",
                    "canonical_url": "/video/v1",
                    "websites": { "site1": { "website_url": "/site1/v1" } },
                    "promo_items": { "basic": { "url": "https://cdn/v1.jpg" } }
                }),
                // circulates on site1 without owning it: still related
                serde_json::json!({
                    "_id": "V2",
                    "type": "video",
                    "canonical_website": "site2",
                    "websites": { "site1": {}, "site2": {} }
                }),
                // unrelated video
                serde_json::json!({
                    "_id": "V3",
                    "type": "video",
                    "canonical_website": "site2",
                    "websites": { "site2": {} }
                }),
                serde_json::json!({ "_id": "S1", "type": "story", "canonical_website": "site1" }),
            ],
        );

        let report = videos_report(&inventory, "site1", dir.path())
            .unwrap()
            .expect("report written");
        assert_eq!(report.count, 2);

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(&report.path).unwrap()).unwrap();
        assert_eq!(entries[0]["_id"], "V1");
        assert_eq!(entries[0]["website_url"], "/site1/v1");
        assert_eq!(entries[0]["promo_image"], "https://cdn/v1.jpg");
        assert_eq!(entries[1]["_id"], "V2");
        assert_eq!(entries[1]["canonical_url"], "");
    }

    #[test]
    fn no_related_videos_means_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = write_inventory(
            dir.path(),
            &[serde_json::json!({ "_id": "S1", "type": "story" })],
        );

        let report = videos_report(&inventory, "site1", dir.path()).unwrap();
        assert!(report.is_none());
        // only the inventory itself is on disk
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
