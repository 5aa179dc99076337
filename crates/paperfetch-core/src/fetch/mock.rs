//! Mock PDF source for tests.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{FetchError, PdfSource};

/// A configurable mock response for [`MockPdfSource`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Serve these bytes as the PDF body.
    Pdf(Vec<u8>),
    /// Answer with a non-success HTTP status.
    Status(u16),
    /// Fail before any byte arrives.
    Transport(String),
    /// Write `partial`, then fail mid-stream.
    Truncated { partial: Vec<u8>, message: String },
}

/// A hand-rolled mock implementing [`PdfSource`] for tests.
///
/// Supports:
/// - A fixed response (used for every call), **or**
/// - A sequence of responses (one per call, repeating the last if exhausted).
/// - Call counting and the list of requested URLs.
pub struct MockPdfSource {
    /// Pending responses, reversed so `pop()` yields the next one.
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    call_count: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockPdfSource {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            call_count: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        responses.reverse();
        let fallback = responses[0].clone();
        Self {
            responses: Mutex::new(responses),
            fallback,
            call_count: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// How many times `download()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// URLs passed to `download()`, in call order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> MockResponse {
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl PdfSource for MockPdfSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn download<'a>(
        &'a self,
        url: &'a str,
        dest: &'a mut (dyn Write + Send),
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<u64, FetchError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        let response = self.next_response();

        Box::pin(async move {
            let io = |e: std::io::Error| FetchError::Io(e.to_string());
            match response {
                MockResponse::Pdf(body) => {
                    dest.write_all(&body).map_err(io)?;
                    Ok(body.len() as u64)
                }
                MockResponse::Status(status) => Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }),
                MockResponse::Transport(message) => Err(FetchError::Transport {
                    url: url.to_string(),
                    message,
                }),
                MockResponse::Truncated { partial, message } => {
                    dest.write_all(&partial).map_err(io)?;
                    Err(FetchError::Transport {
                        url: url.to_string(),
                        message,
                    })
                }
            }
        })
    }
}
