//! Minimal REST client for the CMS content, photo and site APIs.
//!
//! Covers exactly the endpoints the maintenance tools touch: the scrolling
//! content scan, draft-story deletion, circulation removal, the photo API
//! and the site/section API. Every call surfaces the rate-limit headers the
//! CMS attaches to its responses so callers can throttle themselves; the
//! client itself never sleeps and never writes files.
//!
//! # Example
//!
//! ```rust,ignore
//! use cms_client::{CmsClient, ScanQuery};
//!
//! let client = CmsClient::new(base_url, token);
//! let query = ScanQuery::any_of_types(&["story", "gallery", "video"]);
//! let (page, budget) = client.scan("my-site", &query, None, 100).await?;
//! ```

pub mod error;
pub mod types;

pub use error::{CmsError, Result};
pub use types::{Photo, PromoImage, PromoItems, RateBudget, Record, ScanPage, ScanQuery, Section};

use serde_json::Value;

/// Fields the scan asks the CMS to include per record. Everything else is
/// dead weight in a multi-gigabyte inventory.
const SOURCE_FIELDS: &str =
    "_id,type,canonical_website,website,websites,canonical_url,website_url,promo_items.basic";

#[derive(Debug, Clone)]
pub struct CmsClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl CmsClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Fetch one page of the scrolling content scan.
    ///
    /// Pass `scroll_id` from the previous page's `next` token to continue a
    /// scan; `None` starts one. A page with no `next` token is the last.
    pub async fn scan(
        &self,
        website: &str,
        query: &ScanQuery,
        scroll_id: Option<&str>,
        size: u32,
    ) -> Result<(ScanPage, RateBudget)> {
        let url = format!("{}/content/v4/scan", self.base_url);
        let body = serde_json::to_string(query).expect("query serializes");

        let mut params: Vec<(&str, String)> = vec![
            ("website", website.to_string()),
            ("body", body),
            ("size", size.to_string()),
            ("_sourceInclude", SOURCE_FIELDS.to_string()),
        ];
        if let Some(scroll_id) = scroll_id {
            params.push(("scrollId", scroll_id.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await?;
        let (resp, budget) = Self::ok(resp).await?;
        let page: ScanPage = resp.json().await?;
        tracing::debug!(
            website,
            records = page.content_elements.len(),
            has_next = page.next.is_some(),
            "scan page fetched"
        );
        Ok((page, budget))
    }

    /// Delete the draft/master copy of a story.
    pub async fn delete_story(&self, id: &str) -> Result<RateBudget> {
        let url = format!("{}/draft/v1/story/{}", self.base_url, id);
        self.delete(&url).await
    }

    /// Remove one website's circulation entry from a story, leaving the
    /// canonical copy and the other circulations untouched.
    pub async fn delete_circulation(&self, id: &str, website: &str) -> Result<RateBudget> {
        let url = format!(
            "{}/draft/v1/story/{}/circulation/{}",
            self.base_url, id, website
        );
        self.delete(&url).await
    }

    /// Delete a gallery.
    pub async fn delete_gallery(&self, id: &str) -> Result<RateBudget> {
        let url = format!("{}/photo/api/v2/galleries/{}", self.base_url, id);
        self.delete(&url).await
    }

    /// List a website's photos, offset-paginated.
    pub async fn list_photos(
        &self,
        website: &str,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<Photo>, RateBudget)> {
        let url = format!("{}/photo/api/v2/photos", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("primaryWebsite", website),
                ("offset", &offset.to_string()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?;
        let (resp, budget) = Self::ok(resp).await?;
        let photos: Vec<Photo> = resp.json().await?;
        Ok((photos, budget))
    }

    /// Fetch one photo's full metadata.
    pub async fn get_photo(&self, id: &str) -> Result<Value> {
        let url = format!("{}/photo/api/v2/photos/{}", self.base_url, id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let (resp, _) = Self::ok(resp).await?;
        Ok(resp.json().await?)
    }

    /// Delete a photo.
    pub async fn delete_photo(&self, id: &str) -> Result<RateBudget> {
        let url = format!("{}/photo/api/v2/photos/{}", self.base_url, id);
        self.delete(&url).await
    }

    /// List every section of a website.
    pub async fn list_sections(&self, website: &str) -> Result<(Vec<Section>, RateBudget)> {
        let url = format!("{}/site/v3/website/{}/section/", self.base_url, website);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let (resp, budget) = Self::ok(resp).await?;
        let sections: Vec<Section> = resp.json().await?;
        Ok((sections, budget))
    }

    /// Delete one section. The section id goes in the query string because
    /// section ids are slash-delimited paths.
    pub async fn delete_section(&self, website: &str, section_id: &str) -> Result<RateBudget> {
        let url = format!("{}/site/v3/website/{}/section/", self.base_url, website);
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .query(&[("_id", section_id)])
            .send()
            .await?;
        let (_, budget) = Self::ok(resp).await?;
        Ok(budget)
    }

    /// Delete a whole website. The CMS rejects this while the site still has
    /// sections, content or redirects.
    pub async fn delete_site(&self, website: &str) -> Result<RateBudget> {
        let url = format!("{}/site/v3/website/{}", self.base_url, website);
        self.delete(&url).await
    }

    async fn delete(&self, url: &str) -> Result<RateBudget> {
        let resp = self.client.delete(url).bearer_auth(&self.token).send().await?;
        let (_, budget) = Self::ok(resp).await?;
        Ok(budget)
    }

    /// Split a response into body and rate budget, turning any non-2xx
    /// status into `CmsError::Api` with the body attached.
    async fn ok(resp: reqwest::Response) -> Result<(reqwest::Response, RateBudget)> {
        let status = resp.status();
        let budget = RateBudget::from_headers(resp.headers());
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CmsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok((resp, budget))
    }
}
