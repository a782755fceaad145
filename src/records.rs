//! Typed input records
//!
//! The catalog files carry one JSON object per song; the event files
//! carry one JSON object per line per session event. Required fields
//! are non-optional here on purpose: a record missing one fails
//! deserialization, which aborts the stage. Malformed input ends the
//! run; there is no per-record recovery.

use serde::Deserialize;

/// Page value identifying a song-play event
pub const NEXT_SONG: &str = "NextSong";

/// One catalog record, one file per song
#[derive(Debug, Clone, Deserialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i64,
    pub duration: f64,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
}

/// One session event record
///
/// Fields other than `page` and `ts` are nullable in the source data
/// (anonymous sessions, non-playback pages).
#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    pub page: String,
    /// Event time, epoch milliseconds
    pub ts: i64,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub song: Option<String>,
    pub length: Option<f64>,
    pub artist: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<i64>,
    pub location: Option<String>,
}

impl LogRecord {
    /// Whether this event is a song play
    pub fn is_song_play(&self) -> bool {
        self.page == NEXT_SONG
    }
}
