//! Execution context
//!
//! The session owns the storage handles and writer settings for one
//! run. It is created once at process start, passed explicitly to both
//! stages, and released at process end — the scoped equivalent of the
//! source system's implicit global engine handle.

use crate::config::EtlConfig;
use crate::error::Result;
use crate::output::ParquetWriterConfig;
use crate::storage::CloudStore;
use tracing::info;

/// One run's execution context
#[derive(Debug, Clone)]
pub struct EtlSession {
    /// Store holding `song_data/` and `log_data/`
    pub input: CloudStore,
    /// Store receiving the five table directories
    pub output: CloudStore,
    /// Parquet encoding settings shared by all table writes
    pub writer: ParquetWriterConfig,
}

impl EtlSession {
    /// Create the session from a run config
    pub fn create(config: &EtlConfig) -> Result<Self> {
        let input = CloudStore::parse(&config.input_url)?;
        let output = CloudStore::parse(&config.output_url)?;
        info!(
            input = %config.input_url,
            output = %config.output_url,
            "session created"
        );
        Ok(Self {
            input,
            output,
            writer: ParquetWriterConfig::default(),
        })
    }

    /// Release the session
    ///
    /// Storage handles drop here; nothing is flushed because every
    /// table write completes before its stage returns.
    pub fn close(self) {
        info!("session closed");
    }
}
