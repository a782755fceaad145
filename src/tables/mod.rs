//! Output table definitions
//!
//! Each of the five star-schema tables gets a typed row struct, a
//! canonical Arrow schema for its file payload (partition columns are
//! carried in the directory path, not the files), and row↔batch
//! conversion. These schemas are the output contract of the pipeline.

pub mod catalog;
pub mod events;

use crate::error::{Error, Result};
use arrow::array::{Array, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;

/// Storage path of the songs table
pub const SONGS_TABLE: &str = "songs.parquet";
/// Storage path of the artists table
pub const ARTISTS_TABLE: &str = "artists.parquet";
/// Storage path of the users table
pub const USERS_TABLE: &str = "users.parquet";
/// Storage path of the time table
pub const TIME_TABLE: &str = "time.parquet";
/// Storage path of the songplays table
pub const SONGPLAYS_TABLE: &str = "songplays.parquet";

/// Truncate an epoch-ms event time to whole seconds, keeping ms units
///
/// `start_time` is `ts / 1000` converted to a timestamp; sub-second
/// precision is discarded.
pub fn start_time_ms(ts: i64) -> i64 {
    ts.div_euclid(1000) * 1000
}

// ============================================================================
// Column accessors (read-back support)
// ============================================================================

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array> {
    batch
        .column_by_name(name)
        .map(|array| array.as_ref())
        .ok_or_else(|| Error::output(format!("Missing column '{name}' in stored table")))
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, name: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::output(format!("Column '{name}' has an unexpected type")))
}

pub(crate) fn utf8_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    downcast(column(batch, name)?, name)
}

pub(crate) fn f64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    downcast(column(batch, name)?, name)
}

/// Read an optional string cell
pub(crate) fn opt_str(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}
