//! Error taxonomy for the sync pipeline
//!
//! Run-level failures (`ManifestUnavailable`) abort a run; every other variant
//! is recorded against a single item (or, for `UnknownCategory`, against the
//! corporate-action export) and never escapes into sibling work.

use crate::stream::StreamError;

#[derive(Debug)]
pub enum SyncError {
    /// Manifest could not be fetched or parsed; no plan can be made.
    ManifestUnavailable { reason: String, retryable: bool },
    /// Download failed or produced bytes that do not match the manifest.
    Transfer(StreamError),
    /// Package could not be unpacked; package and raw file were removed.
    CorruptArchive(String),
    /// A decoder rejected the raw file (kept on disk for inspection).
    Parse(String),
    /// Writing a derived output failed.
    Persist(std::io::Error),
    /// Corporate-action record carries a category outside 1..=14.
    UnknownCategory(i64),
    /// The item's worker panicked; carries the panic message.
    Panicked(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManifestUnavailable { reason, .. } => write!(f, "manifest unavailable: {reason}"),
            Self::Transfer(e) => write!(f, "transfer failed: {e}"),
            Self::CorruptArchive(msg) => write!(f, "corrupt archive: {msg}"),
            Self::Parse(msg) => write!(f, "decode failed: {msg}"),
            Self::Persist(e) => write!(f, "persist failed: {e}"),
            Self::UnknownCategory(code) => write!(f, "unknown corporate-action category {code}"),
            Self::Panicked(msg) => write!(f, "worker panicked: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transfer(e) => Some(e),
            Self::Persist(e) => Some(e),
            _ => None,
        }
    }
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ManifestUnavailable { retryable, .. } => *retryable,
            Self::Transfer(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Short stable label for summaries and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ManifestUnavailable { .. } => "manifest",
            Self::Transfer(_) => "transfer",
            Self::CorruptArchive(_) => "corrupt-archive",
            Self::Parse(_) => "parse",
            Self::Persist(_) => "persist",
            Self::UnknownCategory(_) => "unknown-category",
            Self::Panicked(_) => "panic",
        }
    }

    /// Item failure from a caught panic payload
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Panicked(msg)
    }

    /// Manifest failure caused by the transport
    pub fn manifest_transport(e: StreamError) -> Self {
        Self::ManifestUnavailable {
            retryable: e.is_retryable(),
            reason: e.to_string(),
        }
    }

    /// Manifest failure caused by an unparsable payload
    pub fn manifest_malformed(reason: impl Into<String>) -> Self {
        Self::ManifestUnavailable {
            reason: reason.into(),
            retryable: false,
        }
    }
}

impl From<StreamError> for SyncError {
    fn from(e: StreamError) -> Self {
        Self::Transfer(e)
    }
}
