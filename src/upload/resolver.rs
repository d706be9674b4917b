//! Upload-parameter resolution.
//!
//! Asks the backend for an upload slot for one file and turns the answer
//! into a transfer descriptor. Nothing here touches batch state; the
//! caller attaches the result to the file's metadata.

use tracing::{debug, warn};

use crate::api::{SlotRequest, SlotResponse, UploadBackend};
use crate::domain::{SelectedFile, TransferDescriptor};

/// Options for building slot requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Send an MD5 checksum of the file body with the slot request.
    pub compute_md5: bool,
}

/// Why no transfer is possible for a file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveFailure {
    /// The backend rejected the parameters (`{status: "error", reason}`).
    #[error("{0}")]
    Validation(String),
    /// The slot endpoint could not be reached, failed, or the file could not be read.
    #[error("Upload slot unavailable: {0}")]
    Transport(String),
}

/// Outcome of resolving one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(TransferDescriptor),
    Failed(ResolveFailure),
}

#[cfg(test)]
impl Resolution {
    /// The transfer descriptor; `None` means no transfer is attempted.
    pub fn descriptor(&self) -> Option<&TransferDescriptor> {
        match self {
            Resolution::Ready(descriptor) => Some(descriptor),
            Resolution::Failed(_) => None,
        }
    }

    /// The error to record on the file's metadata.
    pub fn error(&self) -> Option<String> {
        match self {
            Resolution::Ready(_) => None,
            Resolution::Failed(ResolveFailure::Validation(reason)) => Some(reason.clone()),
            Resolution::Failed(failure) => Some(failure.to_string()),
        }
    }
}

/// Build the slot request body for a file.
pub fn slot_request(file: &SelectedFile, md5_hash: Option<String>) -> SlotRequest {
    SlotRequest {
        file_name: file.name.clone(),
        content_length: file.size,
        md5_hash,
    }
}

/// Resolve upload parameters for one file with a single request.
pub async fn resolve<B>(backend: &B, file: &SelectedFile, options: ResolveOptions) -> Resolution
where
    B: UploadBackend,
{
    let md5_hash = if options.compute_md5 {
        match file.md5_hex().await {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Failed to read {} for checksum: {}", file.name, e);
                return Resolution::Failed(ResolveFailure::Transport(format!(
                    "could not read {}: {}",
                    file.name, e
                )));
            }
        }
    } else {
        None
    };

    let request = slot_request(file, md5_hash);
    debug!(
        "Requesting upload slot for {} ({} bytes)",
        request.file_name, request.content_length
    );

    match backend.request_slot(&request).await {
        Ok(SlotResponse::Issued { id, url }) => {
            debug!("Slot issued for {}: file_id={}", file.name, id);
            Resolution::Ready(TransferDescriptor::presigned_put(id, url))
        }
        Ok(SlotResponse::Rejected { reason, .. }) => {
            warn!("Upload of {} rejected: {}", file.name, reason);
            Resolution::Failed(ResolveFailure::Validation(reason))
        }
        Err(e) => {
            if e.is_transport() {
                warn!("Upload slot endpoint unreachable for {}: {}", file.name, e);
            } else {
                warn!("Upload slot request for {} failed: {}", file.name, e);
            }
            Resolution::Failed(ResolveFailure::Transport(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use serde_json::json;

    #[test]
    fn test_slot_request_body_is_exact() {
        let file = SelectedFile::from_bytes("clip.mp4", "video/mp4", vec![0u8; 42]);
        let value = serde_json::to_value(slot_request(&file, None)).unwrap();
        assert_eq!(value, json!({"file_name": "clip.mp4", "content_length": 42}));
    }

    #[tokio::test]
    async fn test_resolve_sends_checksum_when_enabled() {
        let backend = FakeBackend::new();
        let file = SelectedFile::from_bytes("clip.mp4", "video/mp4", b"abc".to_vec());

        let resolution = resolve(&backend, &file, ResolveOptions { compute_md5: true }).await;
        assert!(resolution.descriptor().is_some());

        let requests = backend.slot_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            serde_json::to_value(&requests[0]).unwrap(),
            json!({
                "file_name": "clip.mp4",
                "content_length": 3,
                "md5_hash": "900150983cd24fb0d6963f7d28e17f72"
            })
        );
    }

    #[tokio::test]
    async fn test_resolve_issued_slot() {
        let backend = FakeBackend::new();
        let file = SelectedFile::from_bytes("clip.mp4", "video/mp4", vec![1, 2, 3]);

        let resolution = resolve(&backend, &file, ResolveOptions::default()).await;
        let descriptor = resolution.descriptor().unwrap();
        assert_eq!(descriptor.file_id(), "id-clip.mp4");
        assert_eq!(descriptor.url, "https://bucket.test/clip.mp4");
        assert_eq!(descriptor.method, reqwest::Method::PUT);
        assert_eq!(resolution.error(), None);
    }

    #[tokio::test]
    async fn test_resolve_validation_error_records_reason() {
        let backend = FakeBackend::new().reject("clip.mp4", "R");
        let file = SelectedFile::from_bytes("clip.mp4", "video/mp4", vec![1]);

        let resolution = resolve(&backend, &file, ResolveOptions::default()).await;
        assert!(resolution.descriptor().is_none());
        assert_eq!(resolution.error().as_deref(), Some("R"));
        assert_eq!(
            resolution,
            Resolution::Failed(ResolveFailure::Validation("R".to_string()))
        );
    }

    #[tokio::test]
    async fn test_resolve_transport_error_is_distinct() {
        let backend = FakeBackend::new().unavailable("clip.mp4");
        let file = SelectedFile::from_bytes("clip.mp4", "video/mp4", vec![1]);

        let resolution = resolve(&backend, &file, ResolveOptions::default()).await;
        assert!(resolution.descriptor().is_none());
        assert!(matches!(
            resolution,
            Resolution::Failed(ResolveFailure::Transport(_))
        ));
        assert!(backend.transfers().is_empty());
    }
}
