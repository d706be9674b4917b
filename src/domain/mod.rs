//! Domain types shared across modules.
//!
//! This module contains the data model of an upload session: the files a
//! user selected, the metadata attached to each of them, the per-file
//! driver status, and the transfer descriptors issued by the backend.
//! Keeping these here avoids circular dependencies between `api` and
//! `upload`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

const MD5_CHUNK_SIZE: usize = 64 * 1024;

/// Where the bytes of a selected file live.
#[derive(Debug, Clone)]
pub enum FilePayload {
    /// File on disk, read lazily when the transfer starts.
    Path(PathBuf),
    /// Bytes already held in memory.
    Memory(Arc<[u8]>),
}

/// One user-chosen file. Immutable once selected.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub payload: FilePayload,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl SelectedFile {
    /// Select a file on disk. Size and MIME type are captured at selection time.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("Not a regular file: {}", path.display());
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Path has no file name: {}", path.display()))?;

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            payload: FilePayload::Path(path.to_path_buf()),
            name,
            size: metadata.len(),
            mime_type,
        })
    }

    /// Select an in-memory payload.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            size: bytes.len() as u64,
            payload: FilePayload::Memory(Arc::from(bytes)),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    /// Request body for the transfer. Files on disk are streamed, never
    /// loaded whole.
    pub async fn open_body(&self) -> std::io::Result<reqwest::Body> {
        match &self.payload {
            FilePayload::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(reqwest::Body::from(file))
            }
            FilePayload::Memory(bytes) => Ok(reqwest::Body::from(bytes.to_vec())),
        }
    }

    /// Hex MD5 of the file body, hashed in 64 KiB chunks.
    pub async fn md5_hex(&self) -> std::io::Result<String> {
        let path = match &self.payload {
            FilePayload::Memory(bytes) => return Ok(format!("{:x}", md5::compute(bytes))),
            FilePayload::Path(path) => path,
        };

        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = md5::Context::new();
        let mut buffer = vec![0u8; MD5_CHUNK_SIZE];

        loop {
            let bytes_read = file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.consume(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.compute()))
    }
}

/// Per-file driver status.
///
/// `pending → requesting-params → {params-error | slot-unavailable | transferring}
/// → {complete | transfer-error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    Pending,
    RequestingParams,
    /// The backend rejected the upload parameters.
    ParamsError,
    /// The slot-issuing endpoint could not be reached or answered garbage.
    SlotUnavailable,
    Transferring,
    Complete,
    TransferError,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::RequestingParams => "requesting-params",
            FileStatus::ParamsError => "params-error",
            FileStatus::SlotUnavailable => "slot-unavailable",
            FileStatus::Transferring => "transferring",
            FileStatus::Complete => "complete",
            FileStatus::TransferError => "transfer-error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::ParamsError
                | FileStatus::SlotUnavailable
                | FileStatus::Complete
                | FileStatus::TransferError
        )
    }

    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != FileStatus::Complete
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable record attached 1:1 to a [`SelectedFile`] for the lifetime of
/// the upload and edit flow.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadMeta {
    /// Assigned by the backend once the upload slot is issued.
    pub file_id: Option<String>,
    /// Space-delimited tag string.
    pub tags: String,
    pub source: String,
    pub description: String,
    pub original_upload_date: Option<NaiveDate>,
    /// Last failure recorded for this file.
    pub error: Option<String>,
    pub status: FileStatus,
    /// Set once the finalize call for this file succeeded.
    pub published: bool,
}

impl Default for UploadMeta {
    fn default() -> Self {
        Self {
            file_id: None,
            tags: String::new(),
            source: String::new(),
            description: String::new(),
            original_upload_date: None,
            error: None,
            status: FileStatus::Pending,
            published: false,
        }
    }
}

/// Fixed headers sent with every byte transfer.
pub const TRANSFER_HEADERS: [(&str, &str); 2] = [
    ("x-amz-acl", "public-read"),
    ("x-amz-content-sha256", "UNSIGNED-PAYLOAD"),
];

/// Metadata carried alongside a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMeta {
    pub file_id: String,
}

/// How and where to send a file's bytes, issued per file by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub meta: TransferMeta,
}

impl TransferDescriptor {
    /// Build the presigned-PUT descriptor for an issued slot.
    pub fn presigned_put(file_id: impl Into<String>, url: impl Into<String>) -> Self {
        let headers = TRANSFER_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            url: url.into(),
            method: Method::PUT,
            headers,
            meta: TransferMeta {
                file_id: file_id.into(),
            },
        }
    }

    pub fn file_id(&self) -> &str {
        &self.meta.file_id
    }
}

/// A tag completion returned by the suggestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub name: String,
    #[serde(default)]
    pub upload_count: u64,
}
