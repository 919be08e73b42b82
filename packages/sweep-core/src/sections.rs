//! Section and site deletion.
//!
//! Section inventories are small, so this path skips the streaming
//! machinery and works on the listed set directly. The one ordering rule:
//! sections are deleted deepest path first, because the CMS refuses to
//! delete a section that still has children.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use cms_client::{CmsClient, RateBudget, Section};

use crate::audit::{AuditLog, Outcome, OutcomeStatus};
use crate::error::Result;
use crate::processor::BatchReport;
use crate::throttle::Throttle;

/// The site-structure calls the sweeps need from the CMS.
#[async_trait]
pub trait SiteApi: Send + Sync {
    async fn list_sections(&self, website: &str) -> cms_client::Result<(Vec<Section>, RateBudget)>;
    async fn delete_section(&self, website: &str, id: &str) -> cms_client::Result<RateBudget>;
    async fn delete_site(&self, website: &str) -> cms_client::Result<RateBudget>;
}

#[async_trait]
impl SiteApi for CmsClient {
    async fn list_sections(&self, website: &str) -> cms_client::Result<(Vec<Section>, RateBudget)> {
        CmsClient::list_sections(self, website).await
    }

    async fn delete_section(&self, website: &str, id: &str) -> cms_client::Result<RateBudget> {
        CmsClient::delete_section(self, website, id).await
    }

    async fn delete_site(&self, website: &str) -> cms_client::Result<RateBudget> {
        CmsClient::delete_site(self, website).await
    }
}

/// Children strictly before ancestors.
pub fn deepest_first(mut sections: Vec<Section>) -> Vec<Section> {
    sections.sort_by(|a, b| b.depth().cmp(&a.depth()));
    sections
}

/// Delete every section of `website`, deepest first, with one audit line
/// per section.
///
/// `countdown` is the grace period before the first delete, giving the
/// operator a window to abort; `None` skips it. Returns zero counts when the
/// site has no sections.
pub async fn sweep_sections(
    api: &dyn SiteApi,
    website: &str,
    report_dir: &Path,
    throttle: &Throttle,
    countdown: Option<Duration>,
) -> Result<BatchReport> {
    let (sections, _) = api.list_sections(website).await?;
    let mut log = AuditLog::create(report_dir, "deleted-sections")?;
    let mut report = BatchReport {
        processed: 0,
        succeeded: 0,
        failed: 0,
        duplicated: 0,
        log_path: log.path().to_path_buf(),
    };

    if sections.is_empty() {
        tracing::info!(website, "no sections to delete");
        return Ok(report);
    }

    if let Some(grace) = countdown {
        tracing::warn!(
            website,
            sections = sections.len(),
            grace_secs = grace.as_secs(),
            "about to permanently delete ALL sections, interrupt now to abort"
        );
        tokio::time::sleep(grace).await;
    }

    let sections = deepest_first(sections);
    for section in &sections {
        report.processed += 1;
        let outcome = Outcome::new(section.id.clone(), OutcomeStatus::Deleted)
            .with_name(section.name.clone());

        match api.delete_section(website, &section.id).await {
            Ok(budget) => {
                report.succeeded += 1;
                tracing::info!(id = %section.id, "section deleted");
                log.append(&outcome)?;
                throttle.respect(&budget).await;
            }
            Err(err) => {
                report.failed += 1;
                let detail = err.to_string();
                tracing::error!(id = %section.id, error = %detail, "section delete failed");
                log.append(&Outcome {
                    status: OutcomeStatus::Error,
                    ..outcome
                }
                .with_error(Some(detail)))?;
                tokio::time::sleep(throttle.failure_penalty).await;
            }
        }

        tokio::time::sleep(throttle.per_record).await;
    }

    Ok(report)
}

/// Delete the website itself. The CMS rejects this while sections, content
/// or redirects remain, so run the other sweeps first.
pub async fn delete_site(api: &dyn SiteApi, website: &str) -> Result<()> {
    api.delete_site(website).await?;
    tracing::info!(website, "site deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use cms_client::CmsError;

    struct ScriptedSite {
        sections: Vec<Section>,
        fail_ids: Vec<String>,
        deleted: Mutex<Vec<String>>,
    }

    impl ScriptedSite {
        fn new(ids: &[&str]) -> Self {
            Self {
                sections: ids
                    .iter()
                    .map(|id| Section {
                        id: id.to_string(),
                        name: Some(format!("name of {id}")),
                    })
                    .collect(),
                fail_ids: Vec::new(),
                deleted: Mutex::new(Vec::new()),
            }
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SiteApi for ScriptedSite {
        async fn list_sections(
            &self,
            _website: &str,
        ) -> cms_client::Result<(Vec<Section>, RateBudget)> {
            Ok((self.sections.clone(), RateBudget::default()))
        }

        async fn delete_section(
            &self,
            _website: &str,
            id: &str,
        ) -> cms_client::Result<RateBudget> {
            self.deleted.lock().unwrap().push(id.to_string());
            if self.fail_ids.contains(&id.to_string()) {
                Err(CmsError::Api {
                    status: 400,
                    body: "section has children".to_string(),
                })
            } else {
                Ok(RateBudget::default())
            }
        }

        async fn delete_site(&self, _website: &str) -> cms_client::Result<RateBudget> {
            Ok(RateBudget::default())
        }
    }

    fn depth_of(id: &str) -> usize {
        id.split('/').filter(|s| !s.is_empty()).count()
    }

    #[tokio::test]
    async fn children_are_deleted_strictly_before_ancestors() {
        let site = ScriptedSite::new(&[
            "/news",
            "/news/politics/local",
            "/sports",
            "/news/politics",
            "/news/politics/local/school-board",
        ]);
        let dir = tempfile::tempdir().unwrap();

        let report = sweep_sections(&site, "site1", dir.path(), &Throttle::unthrottled(), None)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 5);
        let order = site.deleted();
        let depths: Vec<usize> = order.iter().map(|id| depth_of(id)).collect();
        let mut sorted = depths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(depths, sorted, "deletion order must be non-increasing in depth");
    }

    #[tokio::test]
    async fn a_failed_section_does_not_stop_the_sweep() {
        let mut site = ScriptedSite::new(&["/a/b", "/a", "/c"]);
        site.fail_ids = vec!["/a".to_string()];
        let dir = tempfile::tempdir().unwrap();

        let report = sweep_sections(&site, "site1", dir.path(), &Throttle::unthrottled(), None)
            .await
            .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);

        let lines: Vec<Outcome> = fs::read_to_string(&report.log_path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        let failed = lines.iter().find(|o| o.id == "/a").unwrap();
        assert_eq!(failed.status, OutcomeStatus::Error);
        assert!(failed.error.as_deref().unwrap().contains("section has children"));
        assert_eq!(failed.name.as_deref(), Some("name of /a"));
    }

    #[tokio::test]
    async fn empty_section_list_reports_zero_counts() {
        let site = ScriptedSite::new(&[]);
        let dir = tempfile::tempdir().unwrap();

        let report = sweep_sections(&site, "site1", dir.path(), &Throttle::unthrottled(), None)
            .await
            .unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.succeeded, 0);
    }
}
