//! finsync TDX - mirror of the TDX `gpcw` financial snapshots
//!
//! Keeps a local directory of `gpcw*.zip` packages in step with the server
//! manifest, converts each package to Parquet, and exports the `gbbq`
//! corporate-action file as CSV.
//!
//! # Features
//!
//! - Hash-based diff: only missing, changed or undecoded packages are touched
//! - Bounded rayon worker pool with per-item isolation and retries
//! - Staging + rename for every file written
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use finsync_core::ProgressContext;
//! use finsync_tdx::{Config, Coordinator, TdxDecoder};
//!
//! let config = Config::default();
//! let transport = Arc::new(config.http_transport());
//! let decoder = Arc::new(TdxDecoder::new(config.corporate_action_key.clone()));
//! let mut coordinator = Coordinator::new(config, transport, decoder, Arc::new(ProgressContext::new()));
//!
//! let summary = coordinator.run()?;
//! summary.log();
//! ```

pub mod archive;
pub mod category;
pub mod config;
pub mod decode;
pub mod diff;
pub mod fetch;
pub mod inventory;
pub mod manifest;
pub mod persist;
pub mod runner;
pub mod worker;

// Re-exports
pub use category::category_label;
pub use config::Config;
pub use decode::{CorporateActionRecord, DecodeError, Decoder, TdxDecoder};
pub use diff::{Plan, PlanReason};
pub use fetch::Outcome;
pub use manifest::{Manifest, ManifestEntry};
pub use runner::{CorporateActionOutcome, Coordinator, RunPhase, RunSummary};
