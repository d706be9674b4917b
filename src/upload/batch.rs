//! Upload batch orchestration.
//!
//! Runs every selected file's driver to a terminal state while keeping at
//! most `concurrency` drivers in flight. Files are admitted in selection
//! order; completion order is whatever the network gives us.

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::driver::{drive, DriverEvent};
use super::resolver::ResolveOptions;
use crate::api::UploadBackend;
use crate::domain::{FileStatus, SelectedFile, UploadMeta};

/// Default ceiling on concurrently uploading files.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 25;

/// Default ceiling on concurrent finalize calls.
pub const DEFAULT_FINALIZE_CONCURRENCY: usize = 3;

/// Concurrency ceiling for a phase: the configured default, lowered to the
/// daily quota when one is set. Never below 1.
pub fn effective_concurrency(default: usize, quota: Option<u32>) -> usize {
    let ceiling = match quota {
        Some(quota) => default.min(quota as usize),
        None => default,
    };
    ceiling.max(1)
}

/// Observer for per-file status changes
pub trait BatchProgress {
    fn on_status(&self, index: usize, file: &SelectedFile, status: FileStatus);
}

/// No-op progress observer
pub struct NoOpProgress;

impl BatchProgress for NoOpProgress {
    fn on_status(&self, _index: usize, _file: &SelectedFile, _status: FileStatus) {}
}

/// One selected file and its metadata.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub file: SelectedFile,
    pub meta: UploadMeta,
}

/// The ordered files of one upload session.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    entries: Vec<BatchEntry>,
}

impl UploadBatch {
    pub fn new(files: Vec<SelectedFile>) -> Self {
        Self {
            entries: files
                .into_iter()
                .map(|file| BatchEntry {
                    file,
                    meta: UploadMeta::default(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [BatchEntry] {
        &mut self.entries
    }

    /// Whether every file has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.entries.iter().all(|e| e.meta.status.is_terminal())
    }

    /// Files whose bytes reached the bucket, in selection order.
    pub fn completed(&self) -> impl Iterator<Item = (usize, &BatchEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.meta.status == FileStatus::Complete)
    }

    /// Files that were not published, in selection order. A retry sends
    /// only these again.
    pub fn unpublished_files(&self) -> Vec<SelectedFile> {
        self.entries
            .iter()
            .filter(|e| !e.meta.published)
            .map(|e| e.file.clone())
            .collect()
    }

    pub fn outcome(&self) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for entry in &self.entries {
            match entry.meta.status {
                FileStatus::Complete => outcome.completed += 1,
                FileStatus::ParamsError => outcome.params_errors += 1,
                FileStatus::SlotUnavailable => outcome.slot_unavailable += 1,
                FileStatus::TransferError => outcome.transfer_errors += 1,
                _ => outcome.unsettled += 1,
            }
        }
        outcome
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Per-status counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub completed: usize,
    pub params_errors: usize,
    pub slot_unavailable: usize,
    pub transfer_errors: usize,
    pub unsettled: usize,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.params_errors + self.slot_unavailable + self.transfer_errors
    }

    pub fn is_settled(&self) -> bool {
        self.unsettled == 0
    }
}

/// Runs a batch of drivers under a concurrency ceiling.
pub struct BatchOrchestrator<'a, B> {
    backend: &'a B,
    concurrency: usize,
    options: ResolveOptions,
}

impl<'a, B> BatchOrchestrator<'a, B>
where
    B: UploadBackend,
{
    pub fn new(backend: &'a B, concurrency: usize, options: ResolveOptions) -> Self {
        Self {
            backend,
            concurrency: concurrency.max(1),
            options,
        }
    }

    /// Run every pending file of `batch` to a terminal state.
    ///
    /// A failed file never aborts its siblings; the returned outcome is the
    /// union of all terminal states.
    pub async fn run(&self, batch: &mut UploadBatch, progress: &dyn BatchProgress) -> BatchOutcome {
        let total = batch.len();
        info!(
            "📤 Uploading {} file(s), at most {} at a time",
            total, self.concurrency
        );

        let mut in_flight = FuturesUnordered::new();
        let mut cursor = 0;

        loop {
            while in_flight.len() < self.concurrency && cursor < total {
                let entry = &mut batch.entries_mut()[cursor];
                if entry.meta.status == FileStatus::Pending {
                    if let Err(e) = entry.meta.apply(&DriverEvent::Admitted) {
                        warn!("{}", e);
                    } else {
                        debug!("Admitted {} ({}/{})", entry.file.name, cursor + 1, total);
                        progress.on_status(cursor, &entry.file, entry.meta.status);
                        in_flight.push(drive(
                            self.backend,
                            cursor,
                            entry.file.clone(),
                            self.options,
                            progress,
                        ));
                    }
                }
                cursor += 1;
            }

            let Some(run) = in_flight.next().await else {
                break;
            };

            let meta = &mut batch.entries_mut()[run.index].meta;
            for event in &run.events {
                if let Err(e) = meta.apply(event) {
                    warn!("{}", e);
                }
            }
        }

        let outcome = batch.outcome();
        info!(
            "✅ Upload phase finished: {} complete, {} failed",
            outcome.completed,
            outcome.failed()
        );
        outcome
    }
}
