//! Catalog stage
//!
//! Reads per-song JSON records and writes the songs and artists
//! dimensions. Songs keep every input row and are partitioned by
//! (year, artist_id); artists are exact-tuple deduplicated and
//! unpartitioned.

use crate::decode::decode_records;
use crate::error::Result;
use crate::output::{group_rows, write_table};
use crate::records::SongRecord;
use crate::session::EtlSession;
use crate::tables::catalog::{
    artists_to_batch, dedup_artists, songs_to_batch, ArtistRow, SongRow,
};
use crate::tables::{ARTISTS_TABLE, SONGS_TABLE};
use tracing::info;

/// Input prefix holding the per-song catalog files
const SONG_DATA_PREFIX: &str = "song_data";

/// Run the catalog stage
pub async fn run(session: &EtlSession) -> Result<()> {
    let records = load_song_records(session).await?;

    let song_rows: Vec<SongRow> = records.iter().map(SongRow::from_record).collect();
    let song_parts = group_rows(song_rows, SongRow::partition)
        .into_iter()
        .map(|(subdir, rows)| songs_to_batch(&rows).map(|batch| (subdir, batch)))
        .collect::<Result<Vec<_>>>()?;
    write_table(&session.output, SONGS_TABLE, song_parts, &session.writer).await?;

    let artist_rows = dedup_artists(records.iter().map(ArtistRow::from_record).collect());
    let artists = artists_to_batch(&artist_rows)?;
    write_table(
        &session.output,
        ARTISTS_TABLE,
        vec![(String::new(), artists)],
        &session.writer,
    )
    .await?;

    info!(
        songs = records.len(),
        artists = artist_rows.len(),
        "catalog stage complete"
    );
    Ok(())
}

/// Load every catalog record from the input store
///
/// A malformed file or a record missing a required field aborts the
/// stage; there is no per-record recovery.
async fn load_song_records(session: &EtlSession) -> Result<Vec<SongRecord>> {
    let locations = session
        .input
        .list_with_suffix(SONG_DATA_PREFIX, ".json")
        .await?;
    info!(files = locations.len(), "loading song data");

    let mut records = Vec::new();
    for location in &locations {
        let body = session.input.get_string(location).await?;
        records.extend(decode_records::<SongRecord>(location.as_ref(), &body)?);
    }
    Ok(records)
}
