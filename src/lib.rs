//! # songlake
//!
//! Batch ETL that reshapes song catalog and listening-event JSON in
//! object storage into a small star schema persisted as partitioned
//! Parquet: `songs`, `artists`, `users`, `time` dimensions and the
//! `songplays` fact table.
//!
//! ## Pipeline
//!
//! ```text
//! song_data/*.json ──▶ catalog stage ──▶ songs.parquet (year/artist_id)
//!                                    └─▶ artists.parquet
//!
//! log_data/*.json ──▶ event stage ──▶ users.parquet
//!                        │        └─▶ time.parquet (year/month)
//!                        └─ join vs persisted songs/artists
//!                                 └─▶ songplays.parquet (year/month)
//! ```
//!
//! Both stages are pure batch transformations with overwrite
//! semantics: every run recomputes all five tables from scratch. The
//! event stage reads the catalog tables back from storage, so the
//! stages must run in order.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Run configuration and credentials
pub mod config;

/// Typed input records
pub mod records;

/// JSON record decoding
pub mod decode;

/// Object storage access
pub mod storage;

/// Parquet encoding and partitioned table writes
pub mod output;

/// Output table row types and schemas
pub mod tables;

/// Execution context
pub mod session;

/// Stage orchestration
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::EtlConfig;
pub use error::{Error, Result};
pub use session::EtlSession;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
