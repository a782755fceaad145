//! Catalog-stage tables: songs and artists

use super::{f64_col, opt_str, utf8_col};
use crate::error::Result;
use crate::output::PartitionValue;
use crate::records::SongRecord;
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Songs
// ============================================================================

/// One row of the songs dimension
///
/// Partitioned by (year, artist_id); every catalog record contributes
/// exactly one row, no dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i64,
    pub duration: f64,
}

impl SongRow {
    /// Project a song row out of a catalog record
    pub fn from_record(record: &SongRecord) -> Self {
        Self {
            song_id: record.song_id.clone(),
            title: record.title.clone(),
            artist_id: record.artist_id.clone(),
            year: record.year,
            duration: record.duration,
        }
    }

    /// Partition key: (year, artist_id)
    pub fn partition(&self) -> Vec<(&'static str, PartitionValue)> {
        vec![
            ("year", PartitionValue::Int(self.year)),
            ("artist_id", PartitionValue::Str(self.artist_id.clone())),
        ]
    }
}

/// File payload schema of the songs table (partition columns excluded)
pub fn songs_file_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("duration", DataType::Float64, false),
    ]))
}

/// Build the file payload batch for one songs partition
pub fn songs_to_batch(rows: &[SongRow]) -> Result<RecordBatch> {
    let song_ids: Vec<&str> = rows.iter().map(|r| r.song_id.as_str()).collect();
    let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
    let durations: Vec<f64> = rows.iter().map(|r| r.duration).collect();

    Ok(RecordBatch::try_new(
        songs_file_schema(),
        vec![
            Arc::new(StringArray::from(song_ids)) as ArrayRef,
            Arc::new(StringArray::from(titles)) as ArrayRef,
            Arc::new(Float64Array::from(durations)) as ArrayRef,
        ],
    )?)
}

/// Rebuild song rows from one stored partition file
///
/// `year` and `artist_id` come from the partition path, not the file.
pub fn songs_from_batch(batch: &RecordBatch, year: i64, artist_id: &str) -> Result<Vec<SongRow>> {
    let song_ids = utf8_col(batch, "song_id")?;
    let titles = utf8_col(batch, "title")?;
    let durations = f64_col(batch, "duration")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        rows.push(SongRow {
            song_id: song_ids.value(i).to_string(),
            title: titles.value(i).to_string(),
            artist_id: artist_id.to_string(),
            year,
            duration: durations.value(i),
        });
    }
    Ok(rows)
}

// ============================================================================
// Artists
// ============================================================================

/// One row of the artists dimension, unpartitioned
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ArtistRow {
    /// Project an artist row out of a catalog record
    pub fn from_record(record: &SongRecord) -> Self {
        Self {
            artist_id: record.artist_id.clone(),
            name: record.artist_name.clone(),
            location: record.artist_location.clone(),
            latitude: record.artist_latitude,
            longitude: record.artist_longitude,
        }
    }

    /// Exact-tuple identity for dedup (f64 fields by bit pattern)
    fn dedup_key(&self) -> (String, String, Option<String>, Option<u64>, Option<u64>) {
        (
            self.artist_id.clone(),
            self.name.clone(),
            self.location.clone(),
            self.latitude.map(f64::to_bits),
            self.longitude.map(f64::to_bits),
        )
    }
}

/// Deduplicate artists on the full 5-tuple, keeping first occurrences
///
/// Two records for the same artist_id with differing descriptive
/// fields both survive; that is source data quality, not handled here.
pub fn dedup_artists(rows: Vec<ArtistRow>) -> Vec<ArtistRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.dedup_key()))
        .collect()
}

/// Schema of the artists table
pub fn artists_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("location", DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
    ]))
}

/// Build the artists batch
pub fn artists_to_batch(rows: &[ArtistRow]) -> Result<RecordBatch> {
    let artist_ids: Vec<&str> = rows.iter().map(|r| r.artist_id.as_str()).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let locations: Vec<Option<&str>> = rows.iter().map(|r| r.location.as_deref()).collect();
    let latitudes: Vec<Option<f64>> = rows.iter().map(|r| r.latitude).collect();
    let longitudes: Vec<Option<f64>> = rows.iter().map(|r| r.longitude).collect();

    Ok(RecordBatch::try_new(
        artists_schema(),
        vec![
            Arc::new(StringArray::from(artist_ids)) as ArrayRef,
            Arc::new(StringArray::from(names)) as ArrayRef,
            Arc::new(StringArray::from(locations)) as ArrayRef,
            Arc::new(Float64Array::from(latitudes)) as ArrayRef,
            Arc::new(Float64Array::from(longitudes)) as ArrayRef,
        ],
    )?)
}

/// Rebuild artist rows from a stored batch
pub fn artists_from_batch(batch: &RecordBatch) -> Result<Vec<ArtistRow>> {
    let artist_ids = utf8_col(batch, "artist_id")?;
    let names = utf8_col(batch, "name")?;
    let locations = utf8_col(batch, "location")?;
    let latitudes = f64_col(batch, "latitude")?;
    let longitudes = f64_col(batch, "longitude")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        rows.push(ArtistRow {
            artist_id: artist_ids.value(i).to_string(),
            name: names.value(i).to_string(),
            location: opt_str(locations, i),
            latitude: (!latitudes.is_null(i)).then(|| latitudes.value(i)),
            longitude: (!longitudes.is_null(i)).then(|| longitudes.value(i)),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(song_id: &str, artist_id: &str, name: &str, year: i64) -> SongRecord {
        SongRecord {
            song_id: song_id.to_string(),
            title: format!("title-{song_id}"),
            artist_id: artist_id.to_string(),
            year,
            duration: 100.5,
            artist_name: name.to_string(),
            artist_location: Some("Somewhere".to_string()),
            artist_latitude: Some(1.25),
            artist_longitude: None,
        }
    }

    #[test]
    fn test_songs_keep_every_record() {
        // Same song twice: both rows survive, no dedup on songs
        let records = vec![record("S1", "A1", "N", 2001), record("S1", "A1", "N", 2001)];
        let rows: Vec<SongRow> = records.iter().map(SongRow::from_record).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], rows[1]);
    }

    #[test]
    fn test_songs_batch_roundtrip() {
        let rows: Vec<SongRow> = vec![
            SongRow::from_record(&record("S1", "A1", "N", 2001)),
            SongRow::from_record(&record("S2", "A1", "N", 2001)),
        ];
        let batch = songs_to_batch(&rows).unwrap();
        assert_eq!(batch.num_columns(), 3); // partition columns stay out of the file

        let back = songs_from_batch(&batch, 2001, "A1").unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_dedup_artists_exact_tuple() {
        let a = ArtistRow::from_record(&record("S1", "A1", "Name", 2001));
        let b = ArtistRow::from_record(&record("S2", "A1", "Name", 1999)); // same artist tuple
        let mut c = ArtistRow::from_record(&record("S3", "A1", "Name", 2001));
        c.location = Some("Elsewhere".to_string()); // differing descriptive field

        let deduped = dedup_artists(vec![a.clone(), b, c.clone()]);
        assert_eq!(deduped, vec![a, c]);
    }

    #[test]
    fn test_artists_batch_roundtrip_with_nulls() {
        let rows = vec![ArtistRow {
            artist_id: "A1".to_string(),
            name: "N".to_string(),
            location: None,
            latitude: None,
            longitude: Some(-73.5),
        }];
        let batch = artists_to_batch(&rows).unwrap();
        assert!(batch.column_by_name("location").unwrap().is_null(0));
        assert_eq!(artists_from_batch(&batch).unwrap(), rows);
    }
}
