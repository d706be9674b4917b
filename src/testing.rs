//! In-memory backend for workflow tests.
//!
//! Slots are issued as `id-<file name>` / `https://bucket.test/<file name>`.
//! Individual files can be scripted to be rejected, to hit an unreachable
//! slot endpoint, or to fail their transfer or finalize call. Every call
//! yields to the scheduler so concurrent drivers interleave.
//!
//! [`serve_once`] is a one-shot local HTTP server for wire-level tests of
//! [`crate::api::ApiClient`].

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::api::{
    ApiError, FinalizeRequest, SlotRequest, SlotResponse, TagSuggestionSource, UploadBackend,
};
use crate::domain::{TagSuggestion, TransferDescriptor};

#[derive(Default)]
pub(crate) struct FakeBackend {
    rejected: HashMap<String, String>,
    unavailable: HashSet<String>,
    failing_transfers: HashSet<String>,
    failing_finalize: HashSet<String>,
    failing_finalize_once: RefCell<HashSet<String>>,
    delays: HashMap<String, usize>,

    active_files: RefCell<HashSet<String>>,
    max_active_files: Cell<usize>,
    slots_in_flight: Cell<usize>,
    max_slots_in_flight: Cell<usize>,
    finalize_in_flight: Cell<usize>,
    max_finalize_in_flight: Cell<usize>,

    slot_requests: RefCell<Vec<SlotRequest>>,
    transfers: RefCell<Vec<(String, usize)>>,
    finalized: RefCell<Vec<(String, FinalizeRequest)>>,
}

fn name_of(file_id: &str) -> &str {
    file_id.strip_prefix("id-").unwrap_or(file_id)
}

fn unavailable_error(url: &str) -> ApiError {
    ApiError::Status {
        url: url.to_string(),
        status: 503,
        body: "Service Unavailable".to_string(),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(mut self, name: &str, reason: &str) -> Self {
        self.rejected.insert(name.to_string(), reason.to_string());
        self
    }

    pub fn unavailable(mut self, name: &str) -> Self {
        self.unavailable.insert(name.to_string());
        self
    }

    pub fn fail_transfer(mut self, name: &str) -> Self {
        self.failing_transfers.insert(name.to_string());
        self
    }

    pub fn fail_finalize(mut self, name: &str) -> Self {
        self.failing_finalize.insert(name.to_string());
        self
    }

    /// Fail only the first finalize call for `name`.
    pub fn fail_finalize_once(self, name: &str) -> Self {
        self.failing_finalize_once
            .borrow_mut()
            .insert(name.to_string());
        self
    }

    /// Number of scheduler yields each call for `name` takes (default 1).
    pub fn delay(mut self, name: &str, yields: usize) -> Self {
        self.delays.insert(name.to_string(), yields);
        self
    }

    pub fn slot_requests(&self) -> Vec<SlotRequest> {
        self.slot_requests.borrow().clone()
    }

    /// `(file_id, byte count)` per completed transfer call, in completion order.
    pub fn transfers(&self) -> Vec<(String, usize)> {
        self.transfers.borrow().clone()
    }

    pub fn finalized(&self) -> Vec<(String, FinalizeRequest)> {
        self.finalized.borrow().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.slot_requests.borrow().len()
            + self.transfers.borrow().len()
            + self.finalized.borrow().len()
    }

    /// Most files observed between slot request and end of transfer at once.
    pub fn max_active_files(&self) -> usize {
        self.max_active_files.get()
    }

    pub fn active_files(&self) -> usize {
        self.active_files.borrow().len()
    }

    pub fn max_slots_in_flight(&self) -> usize {
        self.max_slots_in_flight.get()
    }

    pub fn max_finalize_in_flight(&self) -> usize {
        self.max_finalize_in_flight.get()
    }

    async fn pause(&self, name: &str) {
        let yields = self.delays.get(name).copied().unwrap_or(1);
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
    }

    fn enter(counter: &Cell<usize>, max: &Cell<usize>) {
        counter.set(counter.get() + 1);
        max.set(max.get().max(counter.get()));
    }

    fn leave(counter: &Cell<usize>) {
        counter.set(counter.get() - 1);
    }

    fn activate(&self, name: &str) {
        let mut active = self.active_files.borrow_mut();
        active.insert(name.to_string());
        self.max_active_files
            .set(self.max_active_files.get().max(active.len()));
    }

    fn deactivate(&self, name: &str) {
        self.active_files.borrow_mut().remove(name);
    }
}

impl UploadBackend for FakeBackend {
    async fn request_slot(&self, request: &SlotRequest) -> Result<SlotResponse, ApiError> {
        let name = request.file_name.clone();
        self.slot_requests.borrow_mut().push(request.clone());
        self.activate(&name);
        Self::enter(&self.slots_in_flight, &self.max_slots_in_flight);

        self.pause(&name).await;

        Self::leave(&self.slots_in_flight);

        if self.unavailable.contains(&name) {
            self.deactivate(&name);
            return Err(unavailable_error("http://fake/upload"));
        }

        if let Some(reason) = self.rejected.get(&name) {
            self.deactivate(&name);
            return Ok(SlotResponse::Rejected {
                status: "error".to_string(),
                reason: reason.clone(),
            });
        }

        Ok(SlotResponse::Issued {
            id: format!("id-{}", name),
            url: format!("https://bucket.test/{}", name),
        })
    }

    async fn transfer(
        &self,
        descriptor: &TransferDescriptor,
        _body: reqwest::Body,
        content_length: u64,
    ) -> Result<(), ApiError> {
        let name = name_of(descriptor.file_id()).to_string();

        self.pause(&name).await;

        self.transfers
            .borrow_mut()
            .push((descriptor.file_id().to_string(), content_length as usize));
        self.deactivate(&name);

        if self.failing_transfers.contains(&name) {
            return Err(unavailable_error(&descriptor.url));
        }

        Ok(())
    }

    async fn finalize(
        &self,
        file_id: &str,
        request: &FinalizeRequest,
    ) -> Result<serde_json::Value, ApiError> {
        let name = name_of(file_id).to_string();
        Self::enter(&self.finalize_in_flight, &self.max_finalize_in_flight);

        self.pause(&name).await;

        Self::leave(&self.finalize_in_flight);
        self.finalized
            .borrow_mut()
            .push((file_id.to_string(), request.clone()));

        if self.failing_finalize.contains(&name)
            || self.failing_finalize_once.borrow_mut().remove(&name)
        {
            return Err(ApiError::Status {
                url: format!("http://fake/upload/{}/finalize", file_id),
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }

        Ok(serde_json::json!({"status": "processing"}))
    }
}

impl TagSuggestionSource for FakeBackend {
    async fn suggest_tags(&self, _query: &str) -> Result<Vec<TagSuggestion>, ApiError> {
        Ok(Vec::new())
    }
}

/// One request as seen by [`serve_once`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    /// e.g. `PUT /clip.mp4 HTTP/1.1`
    pub request_line: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Accept a single HTTP/1.1 connection on a local port, wait `delay` after
/// reading the full request, then answer with `status` and `body`.
///
/// Returns the base URL (`http://127.0.0.1:<port>/`) and a handle yielding
/// the recorded request.
pub(crate) async fn serve_once(
    status: u16,
    body: &str,
    delay: Duration,
) -> (String, JoinHandle<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/", listener.local_addr().unwrap());
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        let content_length: usize = headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut request_body = buf[head_end + 4..].to_vec();
        while request_body.len() < content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request_body.extend_from_slice(&chunk[..n]);
        }

        tokio::time::sleep(delay).await;

        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        RecordedRequest {
            request_line,
            headers,
            body: request_body,
        }
    });

    (base_url, handle)
}
