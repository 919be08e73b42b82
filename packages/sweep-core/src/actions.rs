//! The concrete mutation targets the batch processor drives.
//!
//! Actions talk to the CMS through the [`ContentApi`] trait so tests can run
//! whole batches against a scripted remote.

use async_trait::async_trait;

use cms_client::{CmsClient, RateBudget, Record};

use crate::audit::{Outcome, OutcomeStatus};
use crate::processor::RecordAction;

/// The mutation calls record actions need from the CMS.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn delete_story(&self, id: &str) -> cms_client::Result<RateBudget>;
    async fn delete_circulation(&self, id: &str, website: &str) -> cms_client::Result<RateBudget>;
    async fn delete_gallery(&self, id: &str) -> cms_client::Result<RateBudget>;
    async fn delete_photo(&self, id: &str) -> cms_client::Result<RateBudget>;
}

#[async_trait]
impl ContentApi for CmsClient {
    async fn delete_story(&self, id: &str) -> cms_client::Result<RateBudget> {
        CmsClient::delete_story(self, id).await
    }

    async fn delete_circulation(&self, id: &str, website: &str) -> cms_client::Result<RateBudget> {
        CmsClient::delete_circulation(self, id, website).await
    }

    async fn delete_gallery(&self, id: &str) -> cms_client::Result<RateBudget> {
        CmsClient::delete_gallery(self, id).await
    }

    async fn delete_photo(&self, id: &str) -> cms_client::Result<RateBudget> {
        CmsClient::delete_photo(self, id).await
    }
}

#[async_trait]
impl<T: ContentApi + ?Sized> ContentApi for &T {
    async fn delete_story(&self, id: &str) -> cms_client::Result<RateBudget> {
        (**self).delete_story(id).await
    }

    async fn delete_circulation(&self, id: &str, website: &str) -> cms_client::Result<RateBudget> {
        (**self).delete_circulation(id, website).await
    }

    async fn delete_gallery(&self, id: &str) -> cms_client::Result<RateBudget> {
        (**self).delete_gallery(id).await
    }

    async fn delete_photo(&self, id: &str) -> cms_client::Result<RateBudget> {
        (**self).delete_photo(id).await
    }
}

/// Remove the operating site's circulation entry from records it does not
/// canonically own. The canonical copy is never touched through this path:
/// records whose canonical owner is the operating site are left alone.
pub struct Decirculate<C> {
    api: C,
    website: String,
}

impl<C> Decirculate<C> {
    pub fn new(api: C, website: impl Into<String>) -> Self {
        Self {
            api,
            website: website.into(),
        }
    }
}

#[async_trait]
impl<C: ContentApi> RecordAction for Decirculate<C> {
    fn selects(&self, record: &Record) -> bool {
        record.circulates_on(&self.website) && !record.is_canonical_for(&self.website)
    }

    async fn apply(&self, record: &Record) -> cms_client::Result<RateBudget> {
        self.api.delete_circulation(&record.id, &self.website).await
    }

    fn success_status(&self) -> OutcomeStatus {
        OutcomeStatus::Success
    }

    fn outcome(&self, record: &Record, status: OutcomeStatus) -> Outcome {
        Outcome::new(record.id.clone(), status)
            .with_website(self.website.clone())
            .with_canonical(record.canonical_website.clone())
    }
}

/// Delete the draft/master copy of stories the operating site canonically
/// owns.
pub struct DeleteCanonical<C> {
    api: C,
    website: String,
}

impl<C> DeleteCanonical<C> {
    pub fn new(api: C, website: impl Into<String>) -> Self {
        Self {
            api,
            website: website.into(),
        }
    }
}

#[async_trait]
impl<C: ContentApi> RecordAction for DeleteCanonical<C> {
    fn selects(&self, record: &Record) -> bool {
        record.is_canonical_for(&self.website) && record.kind.as_deref() == Some("story")
    }

    async fn apply(&self, record: &Record) -> cms_client::Result<RateBudget> {
        self.api.delete_story(&record.id).await
    }

    fn outcome(&self, record: &Record, status: OutcomeStatus) -> Outcome {
        Outcome::new(record.id.clone(), status).with_website(self.website.clone())
    }
}

/// Delete every gallery in the inventory.
pub struct DeleteGalleries<C> {
    api: C,
}

impl<C> DeleteGalleries<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<C: ContentApi> RecordAction for DeleteGalleries<C> {
    fn selects(&self, record: &Record) -> bool {
        record.kind.as_deref() == Some("gallery")
    }

    async fn apply(&self, record: &Record) -> cms_client::Result<RateBudget> {
        self.api.delete_gallery(&record.id).await
    }
}

/// Delete the promo images referenced by inventory records.
///
/// Many records share one promo image, so deduplication runs on the image
/// id, not the record id: the first record referencing an image deletes it,
/// later ones are recorded as duplicates without another call.
pub struct DeletePromoImages<C> {
    api: C,
}

impl<C> DeletePromoImages<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }

    fn image_id(record: &Record) -> &str {
        record
            .promo_image_id()
            .expect("selected records carry a promo image")
    }
}

#[async_trait]
impl<C: ContentApi> RecordAction for DeletePromoImages<C> {
    fn selects(&self, record: &Record) -> bool {
        record.promo_image_id().is_some()
    }

    fn dedupe_key(&self, record: &Record) -> Option<String> {
        Some(Self::image_id(record).to_string())
    }

    async fn apply(&self, record: &Record) -> cms_client::Result<RateBudget> {
        self.api.delete_photo(Self::image_id(record)).await
    }

    fn outcome(&self, record: &Record, status: OutcomeStatus) -> Outcome {
        Outcome::new(Self::image_id(record).to_string(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use crate::processor::run_batch;
    use crate::throttle::Throttle;

    #[derive(Default)]
    struct ScriptedApi {
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentApi for ScriptedApi {
        async fn delete_story(&self, id: &str) -> cms_client::Result<RateBudget> {
            self.calls.lock().unwrap().push(format!("story:{id}"));
            Ok(RateBudget::default())
        }

        async fn delete_circulation(
            &self,
            id: &str,
            website: &str,
        ) -> cms_client::Result<RateBudget> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("circulation:{id}:{website}"));
            Ok(RateBudget::default())
        }

        async fn delete_gallery(&self, id: &str) -> cms_client::Result<RateBudget> {
            self.calls.lock().unwrap().push(format!("gallery:{id}"));
            Ok(RateBudget::default())
        }

        async fn delete_photo(&self, id: &str) -> cms_client::Result<RateBudget> {
            self.calls.lock().unwrap().push(format!("photo:{id}"));
            Ok(RateBudget::default())
        }
    }

    fn write_inventory(dir: &Path, records: &[serde_json::Value]) -> PathBuf {
        let path = dir.join("content_scan_results.json");
        fs::write(&path, serde_json::to_string_pretty(records).unwrap()).unwrap();
        path
    }

    fn log_lines(path: &Path) -> Vec<Outcome> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn decirculation_spares_the_canonical_owner() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = write_inventory(
            dir.path(),
            &[
                // circulates on site2, canonically owned by site1: selected
                serde_json::json!({
                    "_id": "A",
                    "type": "story",
                    "canonical_website": "site1",
                    "websites": { "site1": {}, "site2": {} }
                }),
                // canonically owned by site2: never decirculated
                serde_json::json!({
                    "_id": "B",
                    "type": "story",
                    "canonical_website": "site2",
                    "websites": { "site2": {} }
                }),
                // no circulation on site2 at all: not selected
                serde_json::json!({
                    "_id": "C",
                    "type": "story",
                    "canonical_website": "site1",
                    "websites": { "site1": {} }
                }),
            ],
        );

        let api = ScriptedApi::default();
        let action = Decirculate::new(&api, "site2");
        let report = run_batch(
            &inventory,
            &action,
            dir.path(),
            "descirculated",
            &Throttle::unthrottled(),
        )
        .await
        .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(api.calls(), ["circulation:A:site2"]);

        let lines = log_lines(&report.log_path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, "A");
        assert_eq!(lines[0].status, OutcomeStatus::Success);
        assert_eq!(lines[0].website_id.as_deref(), Some("site2"));
        assert_eq!(lines[0].canonical_website.as_deref(), Some("site1"));
    }

    #[tokio::test]
    async fn delete_canonical_takes_only_owned_stories() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = write_inventory(
            dir.path(),
            &[
                serde_json::json!({ "_id": "A", "type": "story", "canonical_website": "site1" }),
                serde_json::json!({ "_id": "B", "type": "story", "canonical_website": "site2" }),
                serde_json::json!({ "_id": "C", "type": "gallery", "canonical_website": "site1" }),
            ],
        );

        let api = ScriptedApi::default();
        let action = DeleteCanonical::new(&api, "site1");
        let report = run_batch(
            &inventory,
            &action,
            dir.path(),
            "deleted-canonical",
            &Throttle::unthrottled(),
        )
        .await
        .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(api.calls(), ["story:A"]);
    }

    #[tokio::test]
    async fn shared_promo_image_is_deleted_once() {
        let dir = tempfile::tempdir().unwrap();
        let promo = serde_json::json!({ "basic": { "_id": "X", "url": "https://cdn/x.jpg" } });
        let inventory = write_inventory(
            dir.path(),
            &[
                serde_json::json!({ "_id": "A", "type": "story", "promo_items": promo.clone() }),
                serde_json::json!({ "_id": "B", "type": "story", "promo_items": promo }),
                serde_json::json!({ "_id": "C", "type": "story" }),
            ],
        );

        let api = ScriptedApi::default();
        let action = DeletePromoImages::new(&api);
        let report = run_batch(
            &inventory,
            &action,
            dir.path(),
            "deleted-images",
            &Throttle::unthrottled(),
        )
        .await
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.duplicated, 1);
        assert_eq!(api.calls(), ["photo:X"]);

        let lines = log_lines(&report.log_path);
        assert_eq!(lines[0].id, "X");
        assert_eq!(lines[0].status, OutcomeStatus::Deleted);
        assert_eq!(lines[1].id, "X");
        assert_eq!(lines[1].status, OutcomeStatus::Duplicated);
    }

    #[tokio::test]
    async fn galleries_action_selects_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = write_inventory(
            dir.path(),
            &[
                serde_json::json!({ "_id": "G1", "type": "gallery" }),
                serde_json::json!({ "_id": "S1", "type": "story" }),
                serde_json::json!({ "_id": "G2", "type": "gallery" }),
            ],
        );

        let api = ScriptedApi::default();
        let action = DeleteGalleries::new(&api);
        let report = run_batch(
            &inventory,
            &action,
            dir.path(),
            "deleted-galleries",
            &Throttle::unthrottled(),
        )
        .await
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(api.calls(), ["gallery:G1", "gallery:G2"]);
    }
}
