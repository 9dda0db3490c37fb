//! Request and response statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about the requests and responses of a [`crate::Handler`].
///
/// All counters are monotonically non-decreasing and updated with atomic
/// increments; readers use atomic loads. Response bytes include error
/// responses.
#[derive(Debug, Default)]
pub struct HandlerStats {
    requests: AtomicU64,
    request_bytes: AtomicU64,
    response_bytes: AtomicU64,
    error_responses: AtomicU64,
}

impl HandlerStats {
    /// Number of requests received.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Total number of request body bytes read.
    pub fn request_bytes(&self) -> u64 {
        self.request_bytes.load(Ordering::Relaxed)
    }

    /// Total number of response body bytes written.
    pub fn response_bytes(&self) -> u64 {
        self.response_bytes.load(Ordering::Relaxed)
    }

    /// Number of error responses sent.
    pub fn error_responses(&self) -> u64 {
        self.error_responses.load(Ordering::Relaxed)
    }

    pub(crate) fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_request_bytes(&self, n: u64) {
        self.request_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_response_bytes(&self, n: u64) {
        self.response_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_error_responses(&self) {
        self.error_responses.fetch_add(1, Ordering::Relaxed);
    }
}
