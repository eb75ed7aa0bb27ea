//! finsync core - shared infrastructure for archive sync pipelines
//!
//! Transport, error taxonomy, retry, hashing, atomic sinks, progress and
//! logging used by the TDX pipeline and the CLI.

pub mod error;
pub mod hash;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod stream;

// Re-exports for convenience
pub use error::SyncError;
pub use hash::{digests_match, hash_bytes, hash_file, short_hash};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::retry_with_backoff;
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
pub use sink::{
    CsvSink, ParquetSink, cleanup_tmp_files, commit, is_valid_parquet, remove_if_exists, staging_path,
    write_parquet,
};
pub use stream::{HttpTransport, SHARED_RUNTIME, StreamError, Transport};
