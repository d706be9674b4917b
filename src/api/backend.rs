//! Backend seams consumed by the upload workflow and the tag suggestion box.
//!
//! The workflow only ever talks to these traits, so the scheduling and
//! state machines can be exercised against an in-memory backend in tests.
//! [`ApiClient`] is the HTTP implementation.

use tracing::debug;

use super::client::ApiClient;
use super::http::send_with_retry;
use super::types::{
    ApiError, FinalizeRequest, SlotRequest, SlotResponse, TagSuggestionsResponse,
};
use crate::domain::{TagSuggestion, TransferDescriptor};

/// Endpoints used by one upload session.
#[allow(async_fn_in_trait)]
pub trait UploadBackend {
    /// `POST /upload`: ask for an upload slot.
    async fn request_slot(&self, request: &SlotRequest) -> Result<SlotResponse, ApiError>;

    /// Send the file body as described by an issued slot.
    async fn transfer(
        &self,
        descriptor: &TransferDescriptor,
        body: reqwest::Body,
        content_length: u64,
    ) -> Result<(), ApiError>;

    /// `POST /upload/{file_id}/finalize`: attach metadata and publish.
    async fn finalize(
        &self,
        file_id: &str,
        request: &FinalizeRequest,
    ) -> Result<serde_json::Value, ApiError>;
}

/// Source of tag completions for a partial tag.
#[allow(async_fn_in_trait)]
pub trait TagSuggestionSource {
    async fn suggest_tags(&self, query: &str) -> Result<Vec<TagSuggestion>, ApiError>;
}

impl UploadBackend for ApiClient {
    async fn request_slot(&self, request: &SlotRequest) -> Result<SlotResponse, ApiError> {
        self.post_for_outcome("upload", request).await
    }

    async fn transfer(
        &self,
        descriptor: &TransferDescriptor,
        body: reqwest::Body,
        content_length: u64,
    ) -> Result<(), ApiError> {
        let url = url::Url::parse(&descriptor.url).map_err(|source| ApiError::InvalidUrl {
            url: descriptor.url.clone(),
            source,
        })?;

        debug!("Transferring {} bytes to {}", content_length, url);

        // Presigned URLs carry their own signature; no client identification headers.
        // Streamed bodies need an explicit length or they go out chunked.
        let mut request = self
            .transfer_client
            .request(descriptor.method.clone(), url.clone())
            .header(reqwest::header::CONTENT_LENGTH, content_length);
        for (name, value) in &descriptor.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    async fn finalize(
        &self,
        file_id: &str,
        request: &FinalizeRequest,
    ) -> Result<serde_json::Value, ApiError> {
        self.post_json(&format!("upload/{}/finalize", file_id), request)
            .await
    }
}

impl TagSuggestionSource for ApiClient {
    async fn suggest_tags(&self, query: &str) -> Result<Vec<TagSuggestion>, ApiError> {
        let mut url = self.build_url("api/v1/tags/suggestions")?;
        url.query_pairs_mut().append_pair("q", query.trim());

        debug!("Fetching tag suggestions: {}", url);

        let response = send_with_retry(|| {
            self.request(reqwest::Method::GET, url.clone())
                .header("Content-Type", "application/json")
        })
        .await
        .map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let response: TagSuggestionsResponse = ApiClient::decode(&url, response).await?;
        Ok(response.tags.into_iter().map(Into::into).collect())
    }
}
