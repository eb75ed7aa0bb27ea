//! HTTP transport: manifest text fetch and streamed downloads with stall detection.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface for compatibility with rayon workers.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Write buffer for downloads (256KB)
const DOWNLOAD_BUF_SIZE: usize = 256 * 1024;

/// Error types for transport operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error (including read stalls as `TimedOut`)
    Io(std::io::Error),
    /// The item's overall deadline passed
    DeadlineExceeded,
    /// Downloaded bytes do not match what the manifest promised
    Integrity(String),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::DeadlineExceeded => f.write_str("item deadline exceeded"),
            Self::Integrity(msg) => write!(f, "integrity check failed: {msg}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => match status {
                // Request timeout / rate limiting are transient
                Some(408 | 429) => true,
                // Other client errors will not change on retry
                Some(s) => !(400..500).contains(s),
                None => true,
            },
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
            Self::DeadlineExceeded => false,
            // A truncated or corrupted transfer may succeed on the next attempt
            Self::Integrity(_) => true,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Network seam used by the pipeline.
///
/// The HTTP implementation is [`HttpTransport`]; tests substitute fakes that
/// serve fixtures from memory or fail on demand.
pub trait Transport: Send + Sync {
    /// GET a small text resource (the manifest).
    fn fetch_text(&self, url: &str) -> Result<String, StreamError>;

    /// Stream `url` into `dest`, creating or truncating it.
    ///
    /// `dest` is a staging path owned by the caller; on error it may hold a
    /// partial body and the caller is responsible for removing it.
    /// Returns the number of bytes written.
    fn download(
        &self,
        url: &str,
        dest: &Path,
        deadline: Instant,
        pb: &ProgressBar,
    ) -> Result<u64, StreamError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone, Copy)]
pub struct HttpTransport {
    /// No data for this long = stall
    pub read_timeout: Duration,
    /// Whole-request timeout for text fetches
    pub request_timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Transport for HttpTransport {
    fn fetch_text(&self, url: &str) -> Result<String, StreamError> {
        let timeout = self.request_timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let response = SHARED_CLIENT
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;
            response
                .text()
                .await
                .map_err(|e| StreamError::from_reqwest(&e))
        })
    }

    fn download(
        &self,
        url: &str,
        dest: &Path,
        deadline: Instant,
        pb: &ProgressBar,
    ) -> Result<u64, StreamError> {
        let read_timeout = self.read_timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let mut response = with_deadline(deadline, read_timeout, SHARED_CLIENT.get(url).send())
                .await?
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?;

            if let Some(total) = response.content_length() {
                crate::progress::upgrade_to_bar(pb, total);
            }

            let mut out = BufWriter::with_capacity(DOWNLOAD_BUF_SIZE, File::create(dest)?);
            let mut written = 0u64;
            while let Some(chunk) = with_deadline(deadline, read_timeout, response.chunk())
                .await?
                .map_err(|e| StreamError::from_reqwest(&e))?
            {
                out.write_all(&chunk)?;
                written += chunk.len() as u64;
                pb.set_position(written);
            }
            out.flush()?;
            out.get_ref().sync_all()?;
            Ok(written)
        })
    }
}

/// Await `fut`, bounded by both the read-stall timeout and the item deadline.
async fn with_deadline<F: std::future::Future>(
    deadline: Instant,
    read_timeout: Duration,
    fut: F,
) -> Result<F::Output, StreamError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(StreamError::DeadlineExceeded);
    }
    let budget = remaining.min(read_timeout);
    match tokio::time::timeout(budget, fut).await {
        Ok(out) => Ok(out),
        Err(_) if budget < read_timeout => Err(StreamError::DeadlineExceeded),
        Err(_) => Err(StreamError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("read timeout ({}s with no data)", read_timeout.as_secs()),
        ))),
    }
}
