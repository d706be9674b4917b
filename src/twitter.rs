//! "Upload from Twitter" importer.
//!
//! The server downloads the video of a tweet and creates the upload itself;
//! the client only validates the link and forwards it with the tags.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, TwitterUploadRequest, TwitterUploadResponse};
use crate::tags::normalize_tag_string;

/// Shown when the import endpoint could not be reached or failed.
pub const SERVER_ERROR_MESSAGE: &str = "Server error, please try again!";

const TWITTER_ENDPOINT: &str = "api/v1/uploads/twitter";

fn tweet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:(?:www|mobile)\.)?twitter\.com/(?:i/web|\w+)/status/(\d+)")
            .expect("tweet regex is valid")
    })
}

/// Numeric status id of a tweet link, if `url` is one.
pub fn tweet_id(url: &str) -> Option<&str> {
    tweet_regex()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn is_tweet_url(url: &str) -> bool {
    tweet_id(url).is_some()
}

/// Result of an import request the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwitterImport {
    /// Location of the new upload.
    Created { url: String },
    /// The server refused the link; `reason` is user-facing.
    Rejected { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TwitterImportError {
    #[error("Not a tweet link: {0}")]
    InvalidUrl(String),
    #[error("{}", SERVER_ERROR_MESSAGE)]
    Server(#[source] ApiError),
}

impl ApiClient {
    /// Ask the server to import the video of a tweet.
    pub async fn upload_from_twitter(
        &self,
        url: &str,
        tags: &str,
    ) -> Result<TwitterImport, TwitterImportError> {
        let url = url.trim();
        if !is_tweet_url(url) {
            return Err(TwitterImportError::InvalidUrl(url.to_string()));
        }

        let request = TwitterUploadRequest {
            url: url.to_string(),
            tags: normalize_tag_string(tags),
        };
        debug!("Importing tweet {}", url);

        let response: TwitterUploadResponse = self
            .post_for_outcome(TWITTER_ENDPOINT, &request)
            .await
            .map_err(|e| {
                warn!("Twitter import failed: {}", e);
                TwitterImportError::Server(e)
            })?;

        Ok(match response {
            TwitterUploadResponse::Created { url } => {
                info!("Tweet imported as {}", url);
                TwitterImport::Created { url }
            }
            TwitterUploadResponse::Rejected { reason, .. } => {
                warn!("Tweet import rejected: {}", reason);
                TwitterImport::Rejected { reason }
            }
        })
    }
}
