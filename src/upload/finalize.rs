//! Finalize fan-out: publish the metadata of every uploaded file.

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::batch::UploadBatch;
use crate::api::{FinalizeRequest, UploadBackend};
use crate::domain::UploadMeta;
use crate::tags::normalize_tag_string;

/// Finalize body for one file's metadata.
pub fn finalize_request(meta: &UploadMeta) -> FinalizeRequest {
    FinalizeRequest {
        tags: normalize_tag_string(&meta.tags),
        source: meta.source.trim().to_string(),
        description: meta.description.clone(),
        original_upload_date: meta.original_upload_date,
    }
}

/// Result of a finalize phase, as batch indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub finalized: Vec<usize>,
    pub failed: Vec<(usize, String)>,
}

impl FinalizeOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Finalize every file that has a backend file id, at most `concurrency`
/// calls at a time. Successful calls stay finalized even if siblings fail.
pub async fn finalize_all<B>(
    backend: &B,
    batch: &mut UploadBatch,
    concurrency: usize,
) -> FinalizeOutcome
where
    B: UploadBackend,
{
    let jobs: Vec<(usize, String, FinalizeRequest)> = batch
        .completed()
        .filter_map(|(index, entry)| {
            let file_id = entry.meta.file_id.clone()?;
            Some((index, file_id, finalize_request(&entry.meta)))
        })
        .collect();

    debug!("Finalizing {} file(s)", jobs.len());

    let results: Vec<(usize, Result<(), String>)> = stream::iter(jobs)
        .map(|(index, file_id, request)| async move {
            let result = backend
                .finalize(&file_id, &request)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string());
            (index, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = FinalizeOutcome::default();
    for (index, result) in results {
        match result {
            Ok(()) => {
                batch.entries_mut()[index].meta.published = true;
                outcome.finalized.push(index);
            }
            Err(error) => {
                let entry = &mut batch.entries_mut()[index];
                warn!("Finalize of {} failed: {}", entry.file.name, error);
                entry.meta.error = Some(error.clone());
                outcome.failed.push((index, error));
            }
        }
    }

    outcome.finalized.sort_unstable();
    outcome.failed.sort_by_key(|(index, _)| *index);
    outcome
}
