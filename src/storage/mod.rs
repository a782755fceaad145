//! Object storage access
//!
//! `CloudStore` wraps an `object_store` backend parsed from a base
//! URL. Both the input bucket (JSON) and the output bucket (Parquet)
//! go through this type. Retries and request-level fault tolerance
//! belong to the storage client, not this layer.

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Object storage handle parsed from a base URL
///
/// Supported formats:
/// - `s3://bucket/path/` or `s3a://bucket/path/` - AWS S3
/// - `/local/path/` or `file:///local/path/` - Local filesystem
#[derive(Debug, Clone)]
pub struct CloudStore {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Base path prefix within the bucket
    prefix: String,
    /// Original URL scheme for logging
    scheme: String,
}

impl CloudStore {
    /// Parse a base URL and create the appropriate object store
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            Self::parse_s3(url, rest)
        } else if let Some(rest) = url.strip_prefix("s3a://") {
            Self::parse_s3(url, rest)
        } else {
            Self::parse_local(url)
        }
    }

    /// Parse an S3 URL into bucket and prefix
    fn parse_s3(url: &str, without_scheme: &str) -> Result<Self> {
        let (bucket, prefix) = match without_scheme.find('/') {
            Some(idx) => (
                &without_scheme[..idx],
                without_scheme[idx + 1..].to_string(),
            ),
            None => (without_scheme, String::new()),
        };

        if bucket.is_empty() {
            return Err(Error::config(format!("Invalid s3 URL: {url}")));
        }

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create s3 client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: prefix.trim_matches('/').to_string(),
            scheme: "s3".to_string(),
        })
    }

    /// Parse a local filesystem path
    fn parse_local(path: &str) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);

        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            scheme: "file".to_string(),
        })
    }

    /// Check if this is a cloud store (not local)
    pub fn is_cloud(&self) -> bool {
        self.scheme != "file"
    }

    /// Get the scheme (s3, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Resolve a path relative to the base prefix
    fn resolve(&self, relative: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(relative)
        } else {
            ObjectPath::from(format!("{}/{relative}", self.prefix))
        }
    }

    /// List all objects under a prefix whose name ends with `suffix`
    ///
    /// The listing is recursive, which covers the nested
    /// `song_data/*/*/*/*.json` and Hive partition layouts without a
    /// glob engine.
    pub async fn list_with_suffix(&self, prefix: &str, suffix: &str) -> Result<Vec<ObjectPath>> {
        let full_prefix = self.resolve(prefix);
        let mut paths: Vec<ObjectPath> = self
            .store
            .list(Some(&full_prefix))
            .try_filter_map(|meta| {
                let keep = meta.location.as_ref().ends_with(suffix);
                futures::future::ok(keep.then_some(meta.location))
            })
            .try_collect()
            .await?;
        // Object stores list in unspecified order; sort so that runs
        // over unchanged input are deterministic.
        paths.sort();
        Ok(paths)
    }

    /// Fetch an object as bytes
    pub async fn get(&self, location: &ObjectPath) -> Result<Bytes> {
        Ok(self.store.get(location).await?.bytes().await?)
    }

    /// Fetch an object as a UTF-8 string
    pub async fn get_string(&self, location: &ObjectPath) -> Result<String> {
        let bytes = self.get(location).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::storage(format!("{location} is not valid UTF-8: {e}")))
    }

    /// Write bytes to a path relative to the base prefix
    pub async fn put(&self, relative: &str, data: Bytes) -> Result<ObjectPath> {
        let location = self.resolve(relative);
        self.store.put(&location, data.into()).await?;
        Ok(location)
    }

    /// Delete every object under a prefix
    ///
    /// This is the overwrite half of `mode("overwrite")`: each run
    /// clears a table's directory before writing it anew. Deleting a
    /// prefix with no objects is not an error.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let full_prefix = self.resolve(prefix);
        let locations: Vec<ObjectPath> = self
            .store
            .list(Some(&full_prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;

        let count = locations.len();
        for location in locations {
            self.store.delete(&location).await?;
        }
        Ok(count)
    }

    /// Strip the base prefix from a listed location
    ///
    /// Listed locations are bucket-absolute; partition parsing wants
    /// them relative to the table directory.
    pub fn relative_part<'a>(&self, location: &'a ObjectPath) -> &'a str {
        let full = location.as_ref();
        if self.prefix.is_empty() {
            full
        } else {
            full.strip_prefix(self.prefix.as_str())
                .map_or(full, |s| s.trim_start_matches('/'))
        }
    }
}
