//! Error types for the CMS client.

use thiserror::Error;

/// Result type for CMS client operations.
pub type Result<T> = std::result::Result<T, CmsError>;

/// CMS client errors.
#[derive(Debug, Error)]
pub enum CmsError {
    /// Non-2xx response from the CMS.
    #[error("status {status}: {body}")]
    Api { status: u16, body: String },

    /// No response received (connection failed, timeout, request build).
    #[error("no response from server: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CmsError {
    /// True when the remote rejected the call because the quota is exhausted.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CmsError::Api { status: 429, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status_and_body() {
        let err = CmsError::Api {
            status: 404,
            body: "{\"message\":\"not found\"}".to_string(),
        };
        assert_eq!(err.to_string(), "status 404: {\"message\":\"not found\"}");
    }

    #[test]
    fn rate_limit_detection() {
        let limited = CmsError::Api {
            status: 429,
            body: String::new(),
        };
        let other = CmsError::Api {
            status: 500,
            body: String::new(),
        };
        assert!(limited.is_rate_limited());
        assert!(!other.is_rate_limited());
    }
}
