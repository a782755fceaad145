//! Event stage
//!
//! Filters the session logs to song plays, writes the users and time
//! dimensions, then joins the plays against the catalog tables the
//! previous stage persisted to produce the songplays fact table.
//!
//! The stage reads `songs.parquet`/`artists.parquet` back from the
//! output store rather than taking stage-1 results in memory; the
//! storage boundary between the stages is part of the contract.

use crate::decode::decode_records;
use crate::error::{Error, Result};
use crate::output::{group_rows, parse_hive_path, read_table, write_table};
use crate::records::LogRecord;
use crate::session::EtlSession;
use crate::tables::catalog::{artists_from_batch, songs_from_batch, ArtistRow, SongRow};
use crate::tables::events::{
    dedup_time, dedup_users, songplays_to_batch, time_to_batch, users_to_batch, SongplayRow,
    TimeRow, UserRow,
};
use crate::tables::{ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE};
use std::collections::HashMap;
use tracing::info;

/// Input prefix holding the per-session event files
const LOG_DATA_PREFIX: &str = "log_data";

/// Run the event stage
pub async fn run(session: &EtlSession) -> Result<()> {
    let records = load_log_records(session).await?;
    let plays: Vec<LogRecord> = records.into_iter().filter(LogRecord::is_song_play).collect();
    info!(plays = plays.len(), "filtered song-play events");

    // Users dimension
    let user_rows = dedup_users(plays.iter().map(UserRow::from_record).collect());
    let users = users_to_batch(&user_rows)?;
    write_table(
        &session.output,
        USERS_TABLE,
        vec![(String::new(), users)],
        &session.writer,
    )
    .await?;

    // Time dimension, keyed by truncated start_time
    let time_rows = dedup_time(
        plays
            .iter()
            .map(|r| TimeRow::derive(r.ts))
            .collect::<Result<Vec<_>>>()?,
    );
    let time_parts = group_rows(time_rows.clone(), TimeRow::partition)
        .into_iter()
        .map(|(subdir, rows)| time_to_batch(&rows).map(|batch| (subdir, batch)))
        .collect::<Result<Vec<_>>>()?;
    write_table(&session.output, TIME_TABLE, time_parts, &session.writer).await?;

    // Fact table: join plays against the persisted catalog
    let songs = read_songs(session).await?;
    let artists = read_artists(session).await?;
    let songplay_rows = build_songplays(&plays, &songs, &artists, &time_rows)?;

    let songplay_parts = group_rows(songplay_rows, SongplayRow::partition)
        .into_iter()
        .map(|(subdir, rows)| songplays_to_batch(&rows).map(|batch| (subdir, batch)))
        .collect::<Result<Vec<_>>>()?;
    write_table(
        &session.output,
        SONGPLAYS_TABLE,
        songplay_parts,
        &session.writer,
    )
    .await?;

    info!(
        users = user_rows.len(),
        time = time_rows.len(),
        "event stage complete"
    );
    Ok(())
}

/// Load every event record from the input store
async fn load_log_records(session: &EtlSession) -> Result<Vec<LogRecord>> {
    let locations = session
        .input
        .list_with_suffix(LOG_DATA_PREFIX, ".json")
        .await?;
    info!(files = locations.len(), "loading log data");

    let mut records = Vec::new();
    for location in &locations {
        let body = session.input.get_string(location).await?;
        records.extend(decode_records::<LogRecord>(location.as_ref(), &body)?);
    }
    Ok(records)
}

/// Read the songs dimension back from the output store
///
/// Partition columns (year, artist_id) are re-attached from the Hive
/// directory path of each file.
async fn read_songs(session: &EtlSession) -> Result<Vec<SongRow>> {
    let files = read_table(&session.output, SONGS_TABLE).await?;
    let mut rows = Vec::new();
    for (location, batches) in &files {
        let parts = parse_hive_path(session.output.relative_part(location));
        let year: i64 = parts
            .get("year")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::storage(format!("Missing year partition in {location}")))?;
        let artist_id = parts
            .get("artist_id")
            .ok_or_else(|| Error::storage(format!("Missing artist_id partition in {location}")))?;
        for batch in batches {
            rows.extend(songs_from_batch(batch, year, artist_id)?);
        }
    }
    info!(songs = rows.len(), "read persisted songs table");
    Ok(rows)
}

/// Read the artists dimension back from the output store
async fn read_artists(session: &EtlSession) -> Result<Vec<ArtistRow>> {
    let files = read_table(&session.output, ARTISTS_TABLE).await?;
    let mut rows = Vec::new();
    for (_, batches) in &files {
        for batch in batches {
            rows.extend(artists_from_batch(batch)?);
        }
    }
    info!(artists = rows.len(), "read persisted artists table");
    Ok(rows)
}

/// Construct the songplays fact rows
///
/// Left join on (song == title, length == duration), then on
/// (artist == name, artist_id). Join misses null-fill; multiple
/// catalog matches multiply fact rows the way an equality join does.
/// Ids are monotonic within the run and reassigned on every run.
fn build_songplays(
    plays: &[LogRecord],
    songs: &[SongRow],
    artists: &[ArtistRow],
    time_rows: &[TimeRow],
) -> Result<Vec<SongplayRow>> {
    // Exact-equality hash indexes; f64 keys compare by bit pattern
    let mut songs_index: HashMap<(&str, u64), Vec<&SongRow>> = HashMap::new();
    for song in songs {
        songs_index
            .entry((song.title.as_str(), song.duration.to_bits()))
            .or_default()
            .push(song);
    }

    let mut artists_index: HashMap<(&str, &str), usize> = HashMap::new();
    for artist in artists {
        *artists_index
            .entry((artist.name.as_str(), artist.artist_id.as_str()))
            .or_default() += 1;
    }

    let time_index: HashMap<i64, (i32, i32)> = time_rows
        .iter()
        .map(|t| (t.start_time, (t.year, t.month)))
        .collect();

    let mut rows = Vec::with_capacity(plays.len());
    let mut next_id = 0i64;

    for play in plays {
        let time = TimeRow::derive(play.ts)?;
        let (year, month) = *time_index
            .get(&time.start_time)
            .ok_or(Error::Timestamp { ts: play.ts })?;

        let song_matches: Vec<&SongRow> = match (&play.song, play.length) {
            (Some(song), Some(length)) => songs_index
                .get(&(song.as_str(), length.to_bits()))
                .map(|m| m.clone())
                .unwrap_or_default(),
            // SQL null equality never matches
            _ => Vec::new(),
        };

        let mut emit = |song_id: Option<&str>, artist_id: Option<&str>| {
            rows.push(SongplayRow {
                songplay_id: next_id,
                start_time: time.start_time,
                user_id: play.user_id.clone(),
                level: play.level.clone(),
                song_id: song_id.map(ToString::to_string),
                artist_id: artist_id.map(ToString::to_string),
                session_id: play.session_id,
                location: play.location.clone(),
                year,
                month,
            });
            next_id += 1;
        };

        if song_matches.is_empty() {
            emit(None, None);
            continue;
        }

        for song in song_matches {
            let artist_matches = play
                .artist
                .as_ref()
                .and_then(|name| artists_index.get(&(name.as_str(), song.artist_id.as_str())))
                .copied()
                .unwrap_or(0);

            if artist_matches == 0 {
                emit(Some(&song.song_id), None);
            } else {
                for _ in 0..artist_matches {
                    emit(Some(&song.song_id), Some(&song.artist_id));
                }
            }
        }
    }

    Ok(rows)
}
