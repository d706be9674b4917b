//! Multi-file upload workflow.
//!
//! - `resolver`: asks the backend for an upload slot per file
//! - `driver`: one file through slot resolution and byte transfer
//! - `batch`: bounded-concurrency orchestration of all drivers
//! - `finalize`: bounded-concurrency publish of the edited metadata
//! - `page`: the session state machine tying the phases together

mod batch;
mod driver;
mod finalize;
mod page;
mod resolver;

pub use batch::{
    BatchOrchestrator, BatchProgress, NoOpProgress, UploadBatch, DEFAULT_FINALIZE_CONCURRENCY,
    DEFAULT_UPLOAD_CONCURRENCY,
};
pub use page::{ConcurrencyLimits, PageError, PageState, UploadPage};
pub use resolver::ResolveOptions;

#[cfg(test)]
pub use page::{FINALIZE_ERROR_MESSAGE, NOTHING_UPLOADED_MESSAGE};
