//! API client for the media-sharing backend.
//!
//! This module provides HTTP client functionality for the upload slot,
//! byte transfer, finalize, tag suggestion and Twitter import endpoints.

mod backend;
mod client;
mod http;
mod types;

pub use backend::{TagSuggestionSource, UploadBackend};
pub use client::{ApiClient, DEFAULT_TIMEOUT_SECS};
pub use types::{
    ApiError, FinalizeRequest, SlotRequest, SlotResponse, TwitterUploadRequest,
    TwitterUploadResponse,
};
