//! Table output
//!
//! Writes tables to object storage with overwrite semantics: the
//! table's directory is cleared, then one `data.parquet` is written
//! per partition (or a single one for unpartitioned tables).

mod partition;
mod writer;

pub use partition::{group_rows, hive_subdir, parse_hive_path, PartitionValue};
pub use writer::{decode_batches, encode_batch, ParquetWriterConfig};

use crate::error::Result;
use crate::storage::CloudStore;
use arrow::record_batch::RecordBatch;
use object_store::path::Path as ObjectPath;
use tracing::info;

/// Leaf file name within each partition directory
const DATA_FILE: &str = "data.parquet";

/// Write a table as one batch per partition subdirectory
///
/// `parts` pairs a Hive subdirectory (empty string for unpartitioned
/// tables) with the batch of file columns for that partition. Existing
/// contents under `table_path` are removed first.
pub async fn write_table(
    store: &CloudStore,
    table_path: &str,
    parts: Vec<(String, RecordBatch)>,
    config: &ParquetWriterConfig,
) -> Result<()> {
    let removed = store.delete_prefix(table_path).await?;
    if removed > 0 {
        info!(table = table_path, objects = removed, "cleared previous output");
    }

    let mut rows = 0usize;
    let files = parts.len();
    for (subdir, batch) in parts {
        rows += batch.num_rows();
        let bytes = encode_batch(&batch, config)?;
        let relative = if subdir.is_empty() {
            format!("{table_path}/{DATA_FILE}")
        } else {
            format!("{table_path}/{subdir}/{DATA_FILE}")
        };
        store.put(&relative, bytes).await?;
    }

    info!(table = table_path, rows, files, "wrote table");
    Ok(())
}

/// Read every Parquet file of a table back from storage
///
/// Returns `(location, batches)` per file; partitioned readers parse
/// partition values out of the location.
pub async fn read_table(
    store: &CloudStore,
    table_path: &str,
) -> Result<Vec<(ObjectPath, Vec<RecordBatch>)>> {
    let locations = store.list_with_suffix(table_path, ".parquet").await?;
    let mut files = Vec::with_capacity(locations.len());
    for location in locations {
        let bytes = store.get(&location).await?;
        let batches = decode_batches(bytes)?;
        files.push((location, batches));
    }
    Ok(files)
}
