//! Event-stage tables: users, time, songplays

use super::{start_time_ms, utf8_col};
use crate::error::{Error, Result};
use crate::output::PartitionValue;
use crate::records::LogRecord;
use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Timelike};
use std::collections::HashSet;
use std::sync::Arc;

fn timestamp_field(name: &str) -> Field {
    Field::new(name, DataType::Timestamp(TimeUnit::Millisecond, None), false)
}

// ============================================================================
// Users
// ============================================================================

/// One row of the users dimension, unpartitioned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRow {
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

impl UserRow {
    /// Project a user row out of a song-play event
    pub fn from_record(record: &LogRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            gender: record.gender.clone(),
            level: record.level.clone(),
        }
    }
}

/// Deduplicate users on the full tuple, keeping first occurrences
///
/// A user whose `level` changed mid-log keeps one row per level.
pub fn dedup_users(rows: Vec<UserRow>) -> Vec<UserRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// Schema of the users table
pub fn users_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Utf8, true),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("last_name", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ]))
}

/// Build the users batch
pub fn users_to_batch(rows: &[UserRow]) -> Result<RecordBatch> {
    let user_ids: Vec<Option<&str>> = rows.iter().map(|r| r.user_id.as_deref()).collect();
    let first_names: Vec<Option<&str>> = rows.iter().map(|r| r.first_name.as_deref()).collect();
    let last_names: Vec<Option<&str>> = rows.iter().map(|r| r.last_name.as_deref()).collect();
    let genders: Vec<Option<&str>> = rows.iter().map(|r| r.gender.as_deref()).collect();
    let levels: Vec<Option<&str>> = rows.iter().map(|r| r.level.as_deref()).collect();

    Ok(RecordBatch::try_new(
        users_schema(),
        vec![
            Arc::new(StringArray::from(user_ids)) as ArrayRef,
            Arc::new(StringArray::from(first_names)) as ArrayRef,
            Arc::new(StringArray::from(last_names)) as ArrayRef,
            Arc::new(StringArray::from(genders)) as ArrayRef,
            Arc::new(StringArray::from(levels)) as ArrayRef,
        ],
    )?)
}

// ============================================================================
// Time
// ============================================================================

/// One row of the time dimension, keyed by `start_time`
///
/// Partitioned by (year, month).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRow {
    /// Event time truncated to whole seconds, epoch milliseconds
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    /// ISO week of year
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// 1 = Sunday .. 7 = Saturday, locale-independent
    pub weekday: i32,
}

impl TimeRow {
    /// Derive all calendar fields from an epoch-ms event time
    ///
    /// An out-of-range `ts` aborts the run.
    pub fn derive(ts: i64) -> Result<Self> {
        let start_time = start_time_ms(ts);
        let dt = DateTime::from_timestamp(start_time / 1000, 0)
            .ok_or(Error::Timestamp { ts })?;

        Ok(Self {
            start_time,
            hour: dt.hour() as i32,
            day: dt.day() as i32,
            week: dt.iso_week().week() as i32,
            month: dt.month() as i32,
            year: dt.year(),
            weekday: dt.weekday().num_days_from_sunday() as i32 + 1,
        })
    }

    /// Partition key: (year, month)
    pub fn partition(&self) -> Vec<(&'static str, PartitionValue)> {
        vec![
            ("year", PartitionValue::Int(i64::from(self.year))),
            ("month", PartitionValue::Int(i64::from(self.month))),
        ]
    }
}

/// Deduplicate time rows on `start_time`, keeping first occurrences
pub fn dedup_time(rows: Vec<TimeRow>) -> Vec<TimeRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.start_time))
        .collect()
}

/// File payload schema of the time table (partition columns excluded)
pub fn time_file_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        timestamp_field("start_time"),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("weekday", DataType::Int32, false),
    ]))
}

/// Build the file payload batch for one time partition
pub fn time_to_batch(rows: &[TimeRow]) -> Result<RecordBatch> {
    let start_times: Vec<i64> = rows.iter().map(|r| r.start_time).collect();
    let hours: Vec<i32> = rows.iter().map(|r| r.hour).collect();
    let days: Vec<i32> = rows.iter().map(|r| r.day).collect();
    let weeks: Vec<i32> = rows.iter().map(|r| r.week).collect();
    let weekdays: Vec<i32> = rows.iter().map(|r| r.weekday).collect();

    Ok(RecordBatch::try_new(
        time_file_schema(),
        vec![
            Arc::new(TimestampMillisecondArray::from(start_times)) as ArrayRef,
            Arc::new(Int32Array::from(hours)) as ArrayRef,
            Arc::new(Int32Array::from(days)) as ArrayRef,
            Arc::new(Int32Array::from(weeks)) as ArrayRef,
            Arc::new(Int32Array::from(weekdays)) as ArrayRef,
        ],
    )?)
}

// ============================================================================
// Songplays
// ============================================================================

/// One row of the songplays fact table
///
/// Partitioned by (year, month) taken from the time dimension.
/// `song_id`/`artist_id` are null when the catalog join missed; that
/// is expected, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct SongplayRow {
    /// Synthetic id, monotonic within a run, not stable across reruns
    pub songplay_id: i64,
    pub start_time: i64,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub year: i32,
    pub month: i32,
}

impl SongplayRow {
    /// Partition key: (year, month)
    pub fn partition(&self) -> Vec<(&'static str, PartitionValue)> {
        vec![
            ("year", PartitionValue::Int(i64::from(self.year))),
            ("month", PartitionValue::Int(i64::from(self.month))),
        ]
    }
}

/// File payload schema of the songplays table (partition columns excluded)
pub fn songplays_file_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("songplay_id", DataType::Int64, false),
        timestamp_field("start_time"),
        Field::new("user_id", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("session_id", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
    ]))
}

/// Build the file payload batch for one songplays partition
pub fn songplays_to_batch(rows: &[SongplayRow]) -> Result<RecordBatch> {
    let ids: Vec<i64> = rows.iter().map(|r| r.songplay_id).collect();
    let start_times: Vec<i64> = rows.iter().map(|r| r.start_time).collect();
    let user_ids: Vec<Option<&str>> = rows.iter().map(|r| r.user_id.as_deref()).collect();
    let levels: Vec<Option<&str>> = rows.iter().map(|r| r.level.as_deref()).collect();
    let song_ids: Vec<Option<&str>> = rows.iter().map(|r| r.song_id.as_deref()).collect();
    let artist_ids: Vec<Option<&str>> = rows.iter().map(|r| r.artist_id.as_deref()).collect();
    let session_ids: Vec<Option<i64>> = rows.iter().map(|r| r.session_id).collect();
    let locations: Vec<Option<&str>> = rows.iter().map(|r| r.location.as_deref()).collect();

    Ok(RecordBatch::try_new(
        songplays_file_schema(),
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(TimestampMillisecondArray::from(start_times)) as ArrayRef,
            Arc::new(StringArray::from(user_ids)) as ArrayRef,
            Arc::new(StringArray::from(levels)) as ArrayRef,
            Arc::new(StringArray::from(song_ids)) as ArrayRef,
            Arc::new(StringArray::from(artist_ids)) as ArrayRef,
            Arc::new(Int64Array::from(session_ids)) as ArrayRef,
            Arc::new(StringArray::from(locations)) as ArrayRef,
        ],
    )?)
}

/// Rebuild `(song_id, artist_id)` pairs from a stored songplays batch
///
/// Used by tests to check join results without caring about ids.
pub fn songplay_keys_from_batch(batch: &RecordBatch) -> Result<Vec<(Option<String>, Option<String>)>> {
    let song_ids = utf8_col(batch, "song_id")?;
    let artist_ids = utf8_col(batch, "artist_id")?;
    let mut keys = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        keys.push((
            super::opt_str(song_ids, i),
            super::opt_str(artist_ids, i),
        ));
    }
    Ok(keys)
}
