//! Error types for stats fetching.

use thiserror::Error;

/// Errors that can occur while fetching miner statistics.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{reason} (HTTP {code})")]
    Status { code: u16, reason: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Transport("request timed out".to_string());
        }
        // The endpoint path embeds the wallet address; keep it out of chat replies.
        FetchError::Transport(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}

impl FetchError {
    /// Build a status error from a non-200 response.
    ///
    /// `phrase` is the reason phrase the server sent, when it differs from
    /// the standard one for `status`.
    pub fn from_status(status: reqwest::StatusCode, phrase: Option<&str>) -> Self {
        let reason = phrase
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or_else(|| status.canonical_reason())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        FetchError::Status {
            code: status.as_u16(),
            reason,
        }
    }

    /// Short failure reason suitable for showing to a chat user.
    /// For HTTP failures this is the reason phrase alone.
    pub fn reason(&self) -> &str {
        match self {
            FetchError::Status { reason, .. } => reason,
            FetchError::Transport(msg) | FetchError::Decode(msg) | FetchError::InvalidUrl(msg) => {
                msg
            }
        }
    }
}
