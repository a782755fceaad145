//! Hive-style partitioning
//!
//! Partitioned tables are laid out as nested `column=value`
//! directories with the partition columns removed from the file
//! payload. The parse direction re-attaches partition values when a
//! partitioned table is read back from storage.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A single partition column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionValue {
    /// Integer value (years, months)
    Int(i64),
    /// String value (artist ids)
    Str(String),
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Path separators would split the segment
            Self::Str(v) => write!(f, "{}", v.replace('/', "_")),
        }
    }
}

/// Build the Hive subdirectory for a set of partition column values
///
/// `[("year", 2018), ("month", 11)]` becomes `year=2018/month=11`.
pub fn hive_subdir(columns: &[(&str, PartitionValue)]) -> String {
    columns
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse `column=value` segments out of an object path
///
/// Non-partition segments (the table directory, the file name) are
/// ignored. Returns raw string values; callers parse types.
pub fn parse_hive_path(path: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for segment in path.split('/') {
        if let Some((column, value)) = segment.split_once('=') {
            values.insert(column.to_string(), value.to_string());
        }
    }
    values
}

/// Group rows by their partition subdirectory
///
/// Returns `(subdir, rows)` pairs in sorted subdir order so writes are
/// deterministic across runs.
pub fn group_rows<T, F>(rows: Vec<T>, key: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> Vec<(&'static str, PartitionValue)>,
{
    let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for row in rows {
        let subdir = hive_subdir(&key(&row));
        groups.entry(subdir).or_default().push(row);
    }
    groups.into_iter().collect()
}
