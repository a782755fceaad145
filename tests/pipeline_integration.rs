//! End-to-end pipeline tests against local object storage
//!
//! Seeds song and log JSON fixtures into a tempdir input store, runs
//! both stages, and checks the persisted star schema.

use arrow::array::{Array, StringArray, TimestampMillisecondArray};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use songlake::output::{parse_hive_path, read_table};
use songlake::storage::CloudStore;
use songlake::tables::catalog::{artists_from_batch, songs_from_batch, SongRow};
use songlake::tables::events::songplay_keys_from_batch;
use songlake::tables::{
    ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE,
};
use songlake::{pipeline, EtlConfig, EtlSession};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const SONG_A: &str = r#"{"num_songs": 1, "song_id": "SOAAA01", "title": "Silent Night", "artist_id": "AR1", "year": 2018, "duration": 201.25, "artist_name": "The Blue Notes", "artist_location": "Chicago, IL", "artist_latitude": 41.88, "artist_longitude": -87.63}"#;

const SONG_B: &str = r#"{"num_songs": 1, "song_id": "SOBBB02", "title": "Cold Wind", "artist_id": "AR2", "year": 0, "duration": 189.5, "artist_name": "Marla Vane", "artist_location": "", "artist_latitude": null, "artist_longitude": null}"#;

// Same artist tuple as SONG_A: artists must collapse to one row
const SONG_C: &str = r#"{"num_songs": 1, "song_id": "SOCCC03", "title": "Morning Rain", "artist_id": "AR1", "year": 2019, "duration": 150.0, "artist_name": "The Blue Notes", "artist_location": "Chicago, IL", "artist_latitude": 41.88, "artist_longitude": -87.63}"#;

// ts = 1541105830796 → 2018-11-01T21:57:10; full catalog match
const EVENT_MATCH: &str = r#"{"artist": "The Blue Notes", "auth": "Logged In", "firstName": "Sylvie", "gender": "F", "lastName": "Cruz", "length": 201.25, "level": "free", "location": "Klamath Falls, OR", "page": "NextSong", "sessionId": 100, "song": "Silent Night", "ts": 1541105830796, "userId": "10"}"#;

// Non-playback page: contributes to no output table
const EVENT_HOME: &str = r#"{"artist": null, "auth": "Logged In", "firstName": "Guest", "gender": null, "lastName": "User", "length": null, "level": "free", "location": null, "page": "Home", "sessionId": 101, "song": null, "ts": 1541106000000, "userId": "99"}"#;

// Same second as EVENT_MATCH after truncation; no catalog match
const EVENT_MISS: &str = r#"{"artist": "Zzz", "auth": "Logged In", "firstName": "Sylvie", "gender": "F", "lastName": "Cruz", "length": 1.0, "level": "free", "location": "Klamath Falls, OR", "page": "NextSong", "sessionId": 100, "song": "Nope", "ts": 1541105830100, "userId": "10"}"#;

// Title/duration match, wrong artist string: song_id set, artist_id null
const EVENT_HALF: &str = r#"{"artist": "Wrong Name", "auth": "Logged In", "firstName": "Jacob", "gender": "M", "lastName": "Klein", "length": 189.5, "level": "paid", "location": "Tampa, FL", "page": "NextSong", "sessionId": 954, "song": "Cold Wind", "ts": 1543449657796, "userId": "73"}"#;

// Second play by the same user tuple: users must stay deduplicated
const EVENT_MISS2: &str = r#"{"artist": "Qqq", "auth": "Logged In", "firstName": "Jacob", "gender": "M", "lastName": "Klein", "length": 2.0, "level": "paid", "location": "Tampa, FL", "page": "NextSong", "sessionId": 954, "song": "Other", "ts": 1543449700000, "userId": "73"}"#;

async fn seed_input(store: &CloudStore) {
    store
        .put("song_data/A/A/A/SOAAA01.json", Bytes::from_static(SONG_A.as_bytes()))
        .await
        .unwrap();
    store
        .put("song_data/A/A/B/SOBBB02.json", Bytes::from_static(SONG_B.as_bytes()))
        .await
        .unwrap();
    store
        .put("song_data/A/B/C/SOCCC03.json", Bytes::from_static(SONG_C.as_bytes()))
        .await
        .unwrap();

    let log1 = format!("{EVENT_MATCH}\n{EVENT_HOME}\n{EVENT_MISS}\n");
    let log2 = format!("{EVENT_HALF}\n{EVENT_MISS2}\n");
    store
        .put("log_data/2018/11/2018-11-01-events.json", Bytes::from(log1))
        .await
        .unwrap();
    store
        .put("log_data/2018/11/2018-11-29-events.json", Bytes::from(log2))
        .await
        .unwrap();
}

struct Lake {
    _input_dir: TempDir,
    _output_dir: TempDir,
    session: EtlSession,
    output: CloudStore,
}

async fn run_pipeline() -> Lake {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let config = EtlConfig::new(
        input_dir.path().to_str().unwrap(),
        output_dir.path().to_str().unwrap(),
    );
    let session = EtlSession::create(&config).unwrap();
    seed_input(&session.input).await;

    pipeline::run(&session).await.unwrap();

    let output = CloudStore::parse(output_dir.path().to_str().unwrap()).unwrap();
    Lake {
        _input_dir: input_dir,
        _output_dir: output_dir,
        session,
        output,
    }
}

fn string_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    let array = batch
        .column_by_name(name)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
        .collect()
}

// ============================================================================
// Catalog stage
// ============================================================================

#[tokio::test]
async fn test_songs_keep_every_input_record() {
    let lake = run_pipeline().await;

    let files = read_table(&lake.output, SONGS_TABLE).await.unwrap();
    let mut rows: Vec<SongRow> = Vec::new();
    for (location, batches) in &files {
        let parts = parse_hive_path(location.as_ref());
        let year: i64 = parts.get("year").unwrap().parse().unwrap();
        let artist_id = parts.get("artist_id").unwrap();
        for batch in batches {
            rows.extend(songs_from_batch(batch, year, artist_id).unwrap());
        }
    }

    // One row per catalog record, no filtering, no dedup
    assert_eq!(rows.len(), 3);

    let mut ids: Vec<&str> = rows.iter().map(|r| r.song_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["SOAAA01", "SOBBB02", "SOCCC03"]);

    // Partition path carries (year, artist_id)
    let dirs: Vec<&str> = files.iter().map(|(l, _)| l.as_ref()).collect();
    assert!(dirs.iter().any(|d| d.contains("year=2018/artist_id=AR1")));
    assert!(dirs.iter().any(|d| d.contains("year=2019/artist_id=AR1")));
    assert!(dirs.iter().any(|d| d.contains("year=0/artist_id=AR2")));
}

#[tokio::test]
async fn test_artists_deduplicated() {
    let lake = run_pipeline().await;

    let files = read_table(&lake.output, ARTISTS_TABLE).await.unwrap();
    assert_eq!(files.len(), 1); // unpartitioned, single file

    let rows = artists_from_batch(&files[0].1[0]).unwrap();
    // AR1 appears in two catalog records with an identical tuple
    assert_eq!(rows.len(), 2);
    let mut ids: Vec<&str> = rows.iter().map(|r| r.artist_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["AR1", "AR2"]);
}

// ============================================================================
// Event stage
// ============================================================================

#[tokio::test]
async fn test_users_deduplicated_and_filtered() {
    let lake = run_pipeline().await;

    let files = read_table(&lake.output, USERS_TABLE).await.unwrap();
    let batch = &files[0].1[0];
    let user_ids = string_column(batch, "user_id");

    // Two distinct play users; the Home-page user contributes nothing
    assert_eq!(batch.num_rows(), 2);
    assert!(user_ids.contains(&Some("10".to_string())));
    assert!(user_ids.contains(&Some("73".to_string())));
    assert!(!user_ids.contains(&Some("99".to_string())));
}

#[tokio::test]
async fn test_time_dimension() {
    let lake = run_pipeline().await;

    let files = read_table(&lake.output, TIME_TABLE).await.unwrap();
    // All fixture events fall in 2018-11
    assert_eq!(files.len(), 1);
    let parts = parse_hive_path(files[0].0.as_ref());
    assert_eq!(parts.get("year").map(String::as_str), Some("2018"));
    assert_eq!(parts.get("month").map(String::as_str), Some("11"));

    let batch = &files[0].1[0];
    // Two plays share a second; three distinct start_times survive
    assert_eq!(batch.num_rows(), 3);

    let start_times = batch
        .column_by_name("start_time")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .unwrap();
    let values: Vec<i64> = (0..start_times.len()).map(|i| start_times.value(i)).collect();
    assert!(values.contains(&1_541_105_830_000));
    // Sub-second precision is gone
    assert!(values.iter().all(|v| v % 1000 == 0));
    // The Home-page event's second is absent
    assert!(!values.contains(&1_541_106_000_000));
}

#[tokio::test]
async fn test_songplays_join_and_partitioning() {
    let lake = run_pipeline().await;

    let files = read_table(&lake.output, SONGPLAYS_TABLE).await.unwrap();
    assert_eq!(files.len(), 1);
    let parts = parse_hive_path(files[0].0.as_ref());
    assert_eq!(parts.get("year").map(String::as_str), Some("2018"));
    assert_eq!(parts.get("month").map(String::as_str), Some("11"));

    let batch = &files[0].1[0];
    // Four plays, one fact row each (no collisions in the fixtures)
    assert_eq!(batch.num_rows(), 4);

    let mut keys = songplay_keys_from_batch(batch).unwrap();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            // Two misses null-fill rather than dropping the row
            (None, None),
            (None, None),
            // Full match
            (Some("SOAAA01".to_string()), Some("AR1".to_string())),
            // Title/duration matched, artist string did not
            (Some("SOBBB02".to_string()), None),
        ]
    );

    // Every partition (year, month) agrees with the row's start_time
    let start_times = batch
        .column_by_name("start_time")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .unwrap();
    for i in 0..batch.num_rows() {
        let dt = chrono::DateTime::from_timestamp(start_times.value(i) / 1000, 0).unwrap();
        use chrono::Datelike;
        assert_eq!(dt.year().to_string(), *parts.get("year").unwrap());
        assert_eq!(dt.month().to_string(), *parts.get("month").unwrap());
    }
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let lake = run_pipeline().await;

    let read_all = |table: &'static str| {
        let store = lake.output.clone();
        async move {
            let files = read_table(&store, table).await.unwrap();
            files
                .into_iter()
                .map(|(l, b)| (l.to_string(), b))
                .collect::<Vec<_>>()
        }
    };

    let songs_1 = read_all(SONGS_TABLE).await;
    let artists_1 = read_all(ARTISTS_TABLE).await;
    let users_1 = read_all(USERS_TABLE).await;
    let time_1 = read_all(TIME_TABLE).await;
    let plays_1 = read_all(SONGPLAYS_TABLE).await;

    pipeline::run(&lake.session).await.unwrap();

    assert_eq!(read_all(SONGS_TABLE).await, songs_1);
    assert_eq!(read_all(ARTISTS_TABLE).await, artists_1);
    assert_eq!(read_all(USERS_TABLE).await, users_1);
    assert_eq!(read_all(TIME_TABLE).await, time_1);

    // Songplays may differ only in the synthetic id column; compare
    // everything else
    let plays_2 = read_all(SONGPLAYS_TABLE).await;
    assert_eq!(plays_1.len(), plays_2.len());
    for ((loc_1, batches_1), (loc_2, batches_2)) in plays_1.iter().zip(&plays_2) {
        assert_eq!(loc_1, loc_2);
        for (b1, b2) in batches_1.iter().zip(batches_2) {
            let strip = |b: &RecordBatch| {
                let keep: Vec<usize> = (0..b.num_columns())
                    .filter(|&i| b.schema().field(i).name() != "songplay_id")
                    .collect();
                b.project(&keep).unwrap()
            };
            assert_eq!(strip(b1), strip(b2));
        }
    }
}

// ============================================================================
// Failure policy
// ============================================================================

#[tokio::test]
async fn test_malformed_catalog_record_aborts_stage() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();

    let config = EtlConfig::new(
        input_dir.path().to_str().unwrap(),
        output_dir.path().to_str().unwrap(),
    );
    let session = EtlSession::create(&config).unwrap();

    // Missing required `duration`
    session
        .input
        .put(
            "song_data/A/A/A/bad.json",
            Bytes::from_static(
                br#"{"song_id": "S", "title": "T", "artist_id": "A", "year": 1, "artist_name": "N"}"#,
            ),
        )
        .await
        .unwrap();

    assert!(pipeline::run(&session).await.is_err());
}
