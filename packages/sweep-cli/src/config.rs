use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the CMS API.
    pub base_url: String,
    /// Static bearer credential.
    pub access_token: String,
    /// The site every command operates on.
    pub website_id: String,
    /// Where inventories, reports and audit logs land.
    pub report_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables. A missing required
    /// variable is fatal here, before any file or network I/O happens.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let website_id = env::var("WEBSITE_ID").context("WEBSITE_ID must be set")?;
        let report_dir = env::var("REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(format!("reports-{website_id}")));

        Ok(Self {
            base_url: env::var("CMS_BASE_URL").context("CMS_BASE_URL must be set")?,
            access_token: env::var("CMS_ACCESS_TOKEN").context("CMS_ACCESS_TOKEN must be set")?,
            website_id,
            report_dir,
        })
    }
}
