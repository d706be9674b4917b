//! API request and response types for the media-sharing backend.
//!
//! This module contains the wire shapes of the upload, finalize, tag
//! suggestion and Twitter import endpoints, plus the error type every
//! endpoint call returns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::TagSuggestion;

// ============================================================================
// Upload slot (POST /upload)
// ============================================================================

/// Slot request body. Exactly `{file_name, content_length[, md5_hash]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRequest {
    pub file_name: String,
    pub content_length: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
}

/// Slot response: either an issued slot or a backend validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SlotResponse {
    Issued { id: String, url: String },
    Rejected { status: String, reason: String },
}

// ============================================================================
// Finalize (POST /upload/{file_id}/finalize)
// ============================================================================

/// Finalize request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeRequest {
    pub tags: String,
    pub source: String,
    pub description: String,
    pub original_upload_date: Option<NaiveDate>,
}

// ============================================================================
// Tag suggestions (GET /api/v1/tags/suggestions?q=)
// ============================================================================

/// One entry of the suggestion list. Older servers send bare tag names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum SuggestionEntry {
    Counted(TagSuggestion),
    Bare(String),
}

impl From<SuggestionEntry> for TagSuggestion {
    fn from(entry: SuggestionEntry) -> Self {
        match entry {
            SuggestionEntry::Counted(tag) => tag,
            SuggestionEntry::Bare(name) => TagSuggestion {
                name,
                upload_count: 0,
            },
        }
    }
}

/// Tag suggestion response
#[derive(Debug, Deserialize)]
pub(super) struct TagSuggestionsResponse {
    #[serde(default)]
    pub tags: Vec<SuggestionEntry>,
}

// ============================================================================
// Twitter import (POST /api/v1/uploads/twitter)
// ============================================================================

/// Twitter import request body
#[derive(Debug, Clone, Serialize)]
pub struct TwitterUploadRequest {
    pub url: String,
    pub tags: String,
}

/// Twitter import response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TwitterUploadResponse {
    Rejected { status: String, reason: String },
    Created { url: String },
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single endpoint call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status of the failed call, if the server answered at all.
    #[cfg(test)]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the call never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}
