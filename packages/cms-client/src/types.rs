use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One content item as returned by the scan endpoint.
///
/// Only the fields the maintenance tools act on are typed; everything else
/// the CMS sends is preserved verbatim in `extra` so inventories round-trip
/// faithfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub websites: HashMap<String, WebsiteEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promo_items: Option<PromoItems>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// True when `website` holds the master copy of this record.
    pub fn is_canonical_for(&self, website: &str) -> bool {
        self.canonical_website.as_deref() == Some(website)
    }

    /// True when `website` has a circulation entry for this record.
    pub fn circulates_on(&self, website: &str) -> bool {
        self.websites.contains_key(website)
    }

    /// Identifier of the nested promo image, when the record carries one.
    pub fn promo_image_id(&self) -> Option<&str> {
        self.promo_items.as_ref()?.basic.as_ref()?.id.as_deref()
    }

    /// URL of the nested promo image, when the record carries one.
    pub fn promo_image_url(&self) -> Option<&str> {
        self.promo_items.as_ref()?.basic.as_ref()?.url.as_deref()
    }
}

/// Circulation metadata for one website.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebsiteEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
}

/// Promo image references attached to a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoItems {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<PromoImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoImage {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One page of scan results plus the continuation token for the next page.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanPage {
    #[serde(default)]
    pub content_elements: Vec<Record>,
    #[serde(default)]
    pub next: Option<String>,
}

/// The boolean any-of-these-types filter sent to the scan endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ScanQuery {
    query: Value,
}

impl ScanQuery {
    /// Match records whose `type` is any of the given kinds.
    pub fn any_of_types(kinds: &[&str]) -> Self {
        let should: Vec<Value> = kinds
            .iter()
            .map(|kind| serde_json::json!({ "match": { "type": kind } }))
            .collect();
        Self {
            query: serde_json::json!({
                "bool": {
                    "minimum_should_match": 1,
                    "should": should,
                }
            }),
        }
    }
}

/// A photo as returned by the photo API.
#[derive(Debug, Clone, Deserialize)]
pub struct Photo {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "originalName", default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub updated_date: Option<String>,
}

/// A site section. Section ids are slash-delimited paths.
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Section {
    /// Hierarchy depth, measured in path segments.
    pub fn depth(&self) -> usize {
        self.id.split('/').filter(|s| !s.is_empty()).count()
    }
}

/// Rate-limit state advertised by the last response.
///
/// Absent or garbled headers parse to `None`; the caller decides what to do
/// with a missing budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateBudget {
    /// Calls left in the current window.
    pub remaining: Option<u32>,
    /// Wall-clock time the window resets, in epoch seconds.
    pub reset_epoch: Option<u64>,
}

impl RateBudget {
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        Self {
            remaining: header_number(headers, "x-ratelimit-remaining"),
            reset_epoch: header_number(headers, "x-ratelimit-reset"),
        }
    }
}

fn header_number<T: std::str::FromStr>(
    headers: &reqwest::header::HeaderMap,
    name: &str,
) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
