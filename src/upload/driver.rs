//! Per-file upload driver.
//!
//! Drives one file through slot resolution and byte transfer. Status
//! changes are expressed as [`DriverEvent`]s folded through the pure
//! [`next_status`] transition function, so the same sequence can be
//! replayed onto the file's [`UploadMeta`] by the orchestrator.

use tracing::{info, warn};

use super::batch::BatchProgress;
use super::resolver::{resolve, Resolution, ResolveFailure, ResolveOptions};
use crate::api::UploadBackend;
use crate::domain::{FileStatus, SelectedFile, UploadMeta};

/// Something that happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// The orchestrator admitted the file under the concurrency ceiling.
    Admitted,
    SlotIssued { file_id: String },
    SlotRejected { reason: String },
    SlotUnavailable { error: String },
    TransferSucceeded,
    TransferFailed { error: String },
}

impl DriverEvent {
    fn name(&self) -> &'static str {
        match self {
            DriverEvent::Admitted => "admitted",
            DriverEvent::SlotIssued { .. } => "slot-issued",
            DriverEvent::SlotRejected { .. } => "slot-rejected",
            DriverEvent::SlotUnavailable { .. } => "slot-unavailable",
            DriverEvent::TransferSucceeded => "transfer-succeeded",
            DriverEvent::TransferFailed { .. } => "transfer-failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid file transition from {from} on {event}")]
pub struct InvalidTransition {
    pub from: FileStatus,
    pub event: &'static str,
}

/// Pure per-file transition function.
pub fn next_status(from: FileStatus, event: &DriverEvent) -> Result<FileStatus, InvalidTransition> {
    use DriverEvent as E;
    use FileStatus as S;

    match (from, event) {
        (S::Pending, E::Admitted) => Ok(S::RequestingParams),
        (S::RequestingParams, E::SlotIssued { .. }) => Ok(S::Transferring),
        (S::RequestingParams, E::SlotRejected { .. }) => Ok(S::ParamsError),
        (S::RequestingParams, E::SlotUnavailable { .. }) => Ok(S::SlotUnavailable),
        (S::Transferring, E::TransferSucceeded) => Ok(S::Complete),
        (S::Transferring, E::TransferFailed { .. }) => Ok(S::TransferError),
        _ => Err(InvalidTransition {
            from,
            event: event.name(),
        }),
    }
}

impl UploadMeta {
    /// Apply a driver event, attaching the file id or error it carries.
    pub fn apply(&mut self, event: &DriverEvent) -> Result<(), InvalidTransition> {
        self.status = next_status(self.status, event)?;

        match event {
            DriverEvent::SlotIssued { file_id } => {
                self.file_id = Some(file_id.clone());
                self.error = None;
            }
            DriverEvent::SlotRejected { reason } => self.error = Some(reason.clone()),
            DriverEvent::SlotUnavailable { error } | DriverEvent::TransferFailed { error } => {
                self.error = Some(error.clone())
            }
            DriverEvent::Admitted | DriverEvent::TransferSucceeded => {}
        }

        Ok(())
    }
}

/// Events produced by one driver run, in order.
#[derive(Debug, Clone)]
pub struct DriverRun {
    pub index: usize,
    pub events: Vec<DriverEvent>,
    status: FileStatus,
}

impl DriverRun {
    fn new(index: usize) -> Self {
        Self {
            index,
            events: Vec::new(),
            status: FileStatus::RequestingParams,
        }
    }

    pub fn final_status(&self) -> FileStatus {
        self.status
    }

    fn push(&mut self, event: DriverEvent) {
        match next_status(self.status, &event) {
            Ok(status) => self.status = status,
            Err(e) => warn!("{}", e),
        }
        self.events.push(event);
    }
}

/// Run one admitted file to a terminal state.
///
/// Slot resolution strictly precedes the transfer. No retries: a failure
/// is terminal for this file and does not affect siblings.
pub async fn drive<B>(
    backend: &B,
    index: usize,
    file: SelectedFile,
    options: ResolveOptions,
    progress: &dyn BatchProgress,
) -> DriverRun
where
    B: UploadBackend,
{
    let mut run = DriverRun::new(index);

    let descriptor = match resolve(backend, &file, options).await {
        Resolution::Ready(descriptor) => {
            run.push(DriverEvent::SlotIssued {
                file_id: descriptor.file_id().to_string(),
            });
            descriptor
        }
        Resolution::Failed(ResolveFailure::Validation(reason)) => {
            run.push(DriverEvent::SlotRejected { reason });
            progress.on_status(index, &file, run.final_status());
            return run;
        }
        Resolution::Failed(failure) => {
            run.push(DriverEvent::SlotUnavailable {
                error: failure.to_string(),
            });
            progress.on_status(index, &file, run.final_status());
            return run;
        }
    };

    progress.on_status(index, &file, run.final_status());

    let result = match file.open_body().await {
        Ok(body) => backend
            .transfer(&descriptor, body, file.size)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(format!("could not read {}: {}", file.name, e)),
    };

    match result {
        Ok(()) => {
            info!("Uploaded {} (file_id={})", file.name, descriptor.file_id());
            run.push(DriverEvent::TransferSucceeded);
        }
        Err(error) => {
            warn!("Transfer of {} failed: {}", file.name, error);
            run.push(DriverEvent::TransferFailed { error });
        }
    }

    progress.on_status(index, &file, run.final_status());
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use crate::upload::NoOpProgress;

    fn replay(events: &[DriverEvent]) -> UploadMeta {
        let mut meta = UploadMeta::default();
        meta.apply(&DriverEvent::Admitted).unwrap();
        for event in events {
            meta.apply(event).unwrap();
        }
        meta
    }

    #[test]
    fn test_happy_path_transitions() {
        let meta = replay(&[
            DriverEvent::SlotIssued {
                file_id: "abc".to_string(),
            },
            DriverEvent::TransferSucceeded,
        ]);
        assert_eq!(meta.status, FileStatus::Complete);
        assert_eq!(meta.file_id.as_deref(), Some("abc"));
        assert_eq!(meta.error, None);
    }

    #[test]
    fn test_rejection_is_terminal() {
        let meta = replay(&[DriverEvent::SlotRejected {
            reason: "Too large".to_string(),
        }]);
        assert_eq!(meta.status, FileStatus::ParamsError);
        assert_eq!(meta.error.as_deref(), Some("Too large"));
        assert_eq!(meta.file_id, None);

        assert!(next_status(FileStatus::ParamsError, &DriverEvent::TransferSucceeded).is_err());
    }

    #[test]
    fn test_transfer_cannot_precede_slot() {
        let err = next_status(FileStatus::RequestingParams, &DriverEvent::TransferSucceeded)
            .unwrap_err();
        assert_eq!(err.from, FileStatus::RequestingParams);
        assert_eq!(err.event, "transfer-succeeded");

        assert!(next_status(FileStatus::Pending, &DriverEvent::TransferSucceeded).is_err());
    }

    #[test]
    fn test_invalid_apply_leaves_meta_untouched() {
        let mut meta = UploadMeta::default();
        let before = meta.clone();
        assert!(meta
            .apply(&DriverEvent::SlotIssued {
                file_id: "x".to_string()
            })
            .is_err());
        assert_eq!(meta, before);
    }

    #[tokio::test]
    async fn test_drive_success() {
        let backend = FakeBackend::new();
        let file = SelectedFile::from_bytes("a.mp4", "video/mp4", vec![7; 16]);

        let run = drive(&backend, 0, file, ResolveOptions::default(), &NoOpProgress).await;
        assert_eq!(run.final_status(), FileStatus::Complete);
        assert_eq!(backend.transfers(), vec![("id-a.mp4".to_string(), 16)]);
    }

    #[tokio::test]
    async fn test_drive_rejected_never_transfers() {
        let backend = FakeBackend::new().reject("a.mp4", "Daily limit reached");
        let file = SelectedFile::from_bytes("a.mp4", "video/mp4", vec![1]);

        let run = drive(&backend, 0, file, ResolveOptions::default(), &NoOpProgress).await;
        assert_eq!(run.final_status(), FileStatus::ParamsError);
        assert_eq!(
            run.events,
            vec![DriverEvent::SlotRejected {
                reason: "Daily limit reached".to_string()
            }]
        );
        assert!(backend.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_drive_slot_unavailable() {
        let backend = FakeBackend::new().unavailable("a.mp4");
        let file = SelectedFile::from_bytes("a.mp4", "video/mp4", vec![1]);

        let run = drive(&backend, 3, file, ResolveOptions::default(), &NoOpProgress).await;
        assert_eq!(run.index, 3);
        assert_eq!(run.final_status(), FileStatus::SlotUnavailable);
        assert!(backend.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_drive_transfer_failure() {
        let backend = FakeBackend::new().fail_transfer("a.mp4");
        let file = SelectedFile::from_bytes("a.mp4", "video/mp4", vec![1]);

        let run = drive(&backend, 0, file, ResolveOptions::default(), &NoOpProgress).await;
        assert_eq!(run.final_status(), FileStatus::TransferError);
        assert!(matches!(
            run.events.last(),
            Some(DriverEvent::TransferFailed { error }) if error.contains("503")
        ));
    }
}
