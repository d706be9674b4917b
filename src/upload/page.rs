//! Top-level upload session: `upload → edit → {done | error}`.
//!
//! [`PageState::on`] is the pure transition function; [`UploadPage`] owns
//! the batch and performs the network phases that trigger transitions.

use tracing::{info, warn};

use super::batch::{
    effective_concurrency, BatchOrchestrator, BatchOutcome, BatchProgress, UploadBatch,
    DEFAULT_FINALIZE_CONCURRENCY, DEFAULT_UPLOAD_CONCURRENCY,
};
use super::finalize::{finalize_all, FinalizeOutcome};
use super::resolver::ResolveOptions;
use crate::api::UploadBackend;
use crate::domain::{SelectedFile, UploadMeta};

/// Shown when finalize fails for some files.
pub const FINALIZE_ERROR_MESSAGE: &str =
    "Some uploads could not be published. Files that were published successfully will still be processed.";

/// Shown when there is nothing to publish.
pub const NOTHING_UPLOADED_MESSAGE: &str = "None of the selected files were uploaded.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// Daily quota is zero; the page never enters `Upload`.
    QuotaExhausted,
    Upload,
    Edit,
    Done,
    Error { message: String },
}

impl PageState {
    /// Entry state for a caller-supplied daily quota.
    pub fn initial(daily_quota: Option<u32>) -> Self {
        match daily_quota {
            Some(0) => PageState::QuotaExhausted,
            _ => PageState::Upload,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageState::QuotaExhausted => "quota-exhausted",
            PageState::Upload => "upload",
            PageState::Edit => "edit",
            PageState::Done => "done",
            PageState::Error { .. } => "error",
        }
    }

    /// Pure page transition function.
    pub fn on(&self, event: &PageEvent) -> Result<PageState, PageError> {
        match (self, event) {
            (PageState::Upload, PageEvent::UploadsSettled) => Ok(PageState::Edit),
            (PageState::Edit, PageEvent::FinalizeSucceeded) => Ok(PageState::Done),
            (PageState::Edit, PageEvent::FinalizeFailed { message }) => Ok(PageState::Error {
                message: message.clone(),
            }),
            (PageState::Done | PageState::Error { .. }, PageEvent::Reset) => Ok(PageState::Upload),
            (PageState::QuotaExhausted, _) => Err(PageError::QuotaExhausted),
            (state, event) => Err(PageError::InvalidTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// Every admitted file reached a terminal state.
    UploadsSettled,
    FinalizeSucceeded,
    FinalizeFailed { message: String },
    /// Explicit user action from `done` or `error`.
    Reset,
}

impl PageEvent {
    fn name(&self) -> &'static str {
        match self {
            PageEvent::UploadsSettled => "uploads-settled",
            PageEvent::FinalizeSucceeded => "finalize-succeeded",
            PageEvent::FinalizeFailed { .. } => "finalize-failed",
            PageEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("Daily upload quota exhausted")]
    QuotaExhausted,
    #[error("Cannot handle {event} while in {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("No files selected")]
    EmptySelection,
    #[error("No file at index {0}")]
    NoSuchFile(usize),
}

/// Concurrency ceilings for the two network phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyLimits {
    pub upload: usize,
    pub finalize: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            upload: DEFAULT_UPLOAD_CONCURRENCY,
            finalize: DEFAULT_FINALIZE_CONCURRENCY,
        }
    }
}

impl ConcurrencyLimits {
    /// Lower both ceilings to the daily quota, if one is set.
    pub fn capped_by(self, daily_quota: Option<u32>) -> Self {
        Self {
            upload: effective_concurrency(self.upload, daily_quota),
            finalize: effective_concurrency(self.finalize, daily_quota),
        }
    }
}

/// One upload session.
pub struct UploadPage<'a, B> {
    backend: &'a B,
    state: PageState,
    batch: UploadBatch,
    limits: ConcurrencyLimits,
    options: ResolveOptions,
}

impl<'a, B> UploadPage<'a, B>
where
    B: UploadBackend,
{
    pub fn new(
        backend: &'a B,
        daily_quota: Option<u32>,
        limits: ConcurrencyLimits,
        options: ResolveOptions,
    ) -> Self {
        Self {
            backend,
            state: PageState::initial(daily_quota),
            batch: UploadBatch::default(),
            limits: limits.capped_by(daily_quota),
            options,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn batch(&self) -> &UploadBatch {
        &self.batch
    }

    pub fn limits(&self) -> ConcurrencyLimits {
        self.limits
    }

    fn transition(&mut self, event: PageEvent) -> Result<(), PageError> {
        let next = self.state.on(&event)?;
        info!("Page: {} → {}", self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    fn require(&self, expected: PageState, event: &'static str) -> Result<(), PageError> {
        if self.state == PageState::QuotaExhausted {
            return Err(PageError::QuotaExhausted);
        }
        if self.state != expected {
            return Err(PageError::InvalidTransition {
                state: self.state.name(),
                event,
            });
        }
        Ok(())
    }

    /// Upload phase: run the selected files and move to `Edit`.
    ///
    /// Every file is carried into `Edit` with its terminal status attached,
    /// failures included.
    pub async fn upload(
        &mut self,
        files: Vec<SelectedFile>,
        progress: &dyn BatchProgress,
    ) -> Result<BatchOutcome, PageError> {
        self.require(PageState::Upload, "upload")?;
        if files.is_empty() {
            return Err(PageError::EmptySelection);
        }

        self.batch = UploadBatch::new(files);
        let orchestrator = BatchOrchestrator::new(self.backend, self.limits.upload, self.options);
        let outcome = orchestrator.run(&mut self.batch, progress).await;

        if !self.batch.is_settled() {
            warn!("Upload phase ended with unsettled files");
        }

        self.transition(PageEvent::UploadsSettled)?;
        Ok(outcome)
    }

    /// Edit the metadata of one file during the `Edit` step.
    pub fn edit<F>(&mut self, index: usize, f: F) -> Result<(), PageError>
    where
        F: FnOnce(&mut UploadMeta),
    {
        self.require(PageState::Edit, "edit")?;
        let entry = self
            .batch
            .entries_mut()
            .get_mut(index)
            .ok_or(PageError::NoSuchFile(index))?;
        f(&mut entry.meta);
        Ok(())
    }

    /// Publish every uploaded file and move to `Done` or `Error`.
    pub async fn publish(&mut self) -> Result<FinalizeOutcome, PageError> {
        self.require(PageState::Edit, "publish")?;

        if self.batch.completed().next().is_none() {
            self.transition(PageEvent::FinalizeFailed {
                message: NOTHING_UPLOADED_MESSAGE.to_string(),
            })?;
            return Ok(FinalizeOutcome::default());
        }

        let outcome = finalize_all(self.backend, &mut self.batch, self.limits.finalize).await;

        let event = if outcome.all_succeeded() {
            PageEvent::FinalizeSucceeded
        } else {
            PageEvent::FinalizeFailed {
                message: FINALIZE_ERROR_MESSAGE.to_string(),
            }
        };
        self.transition(event)?;

        Ok(outcome)
    }

    /// Clear the batch and return to `Upload`. Outstanding requests are
    /// abandoned, not cancelled.
    pub fn reset(&mut self) -> Result<(), PageError> {
        self.transition(PageEvent::Reset)?;
        self.batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_from_quota() {
        assert_eq!(PageState::initial(None), PageState::Upload);
        assert_eq!(PageState::initial(Some(5)), PageState::Upload);
        assert_eq!(PageState::initial(Some(0)), PageState::QuotaExhausted);
    }

    #[test]
    fn test_transitions() {
        let edit = PageState::Upload.on(&PageEvent::UploadsSettled).unwrap();
        assert_eq!(edit, PageState::Edit);
        assert_eq!(edit.on(&PageEvent::FinalizeSucceeded).unwrap(), PageState::Done);

        let error = edit
            .on(&PageEvent::FinalizeFailed {
                message: "boom".to_string(),
            })
            .unwrap();
        assert_eq!(
            error,
            PageState::Error {
                message: "boom".to_string()
            }
        );
        assert_eq!(error.on(&PageEvent::Reset).unwrap(), PageState::Upload);
        assert_eq!(PageState::Done.on(&PageEvent::Reset).unwrap(), PageState::Upload);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(PageState::Upload.on(&PageEvent::Reset).is_err());
        assert!(PageState::Edit.on(&PageEvent::Reset).is_err());
        assert!(PageState::Upload.on(&PageEvent::FinalizeSucceeded).is_err());
        assert!(PageState::Done.on(&PageEvent::UploadsSettled).is_err());
        assert_eq!(
            PageState::QuotaExhausted.on(&PageEvent::UploadsSettled),
            Err(PageError::QuotaExhausted)
        );
        assert_eq!(
            PageState::QuotaExhausted.on(&PageEvent::Reset),
            Err(PageError::QuotaExhausted)
        );
    }

    #[test]
    fn test_limits_capped_by_quota() {
        let limits = ConcurrencyLimits::default().capped_by(Some(2));
        assert_eq!(limits.upload, 2);
        assert_eq!(limits.finalize, 2);

        let limits = ConcurrencyLimits::default().capped_by(None);
        assert_eq!(limits, ConcurrencyLimits::default());
    }
}
