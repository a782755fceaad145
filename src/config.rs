//! Run configuration and credentials
//!
//! The pipeline takes two base URLs (input and output object storage)
//! and an optional credentials file. The credentials file is a flat
//! INI-style key/value file:
//!
//! ```text
//! [keys]
//! aws_access_key_id = AKIA...
//! aws_secret_access_key = ...
//! ```
//!
//! Credentials are exported into the process environment before any S3
//! client is built, so the `object_store` builder picks them up via
//! `from_env`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default credentials file path
pub const DEFAULT_CREDENTIALS_FILE: &str = "dl.cfg";

/// Environment variable for the S3 access key id
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable for the S3 secret key
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

// ============================================================================
// Run Config
// ============================================================================

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Base URL holding `song_data/` and `log_data/`
    pub input_url: String,

    /// Base URL receiving the five table directories
    pub output_url: String,

    /// Path to the credentials file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

fn default_credentials_path() -> String {
    DEFAULT_CREDENTIALS_FILE.to_string()
}

impl EtlConfig {
    /// Create a config from input/output base URLs
    pub fn new(input_url: impl Into<String>, output_url: impl Into<String>) -> Self {
        Self {
            input_url: input_url.into(),
            output_url: output_url.into(),
            credentials_path: default_credentials_path(),
        }
    }

    /// Override the credentials file path
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<String>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Whether either base URL points at cloud storage
    pub fn needs_credentials(&self) -> bool {
        is_cloud_url(&self.input_url) || is_cloud_url(&self.output_url)
    }
}

/// Check whether a base URL refers to cloud object storage
pub fn is_cloud_url(url: &str) -> bool {
    url.starts_with("s3://") || url.starts_with("s3a://")
}

// ============================================================================
// Credentials
// ============================================================================

/// Object-storage credentials loaded from the local config file
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
}

impl Credentials {
    /// Load credentials from an INI-style key/value file
    ///
    /// A missing file or missing key is a fatal configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&contents)
    }

    /// Parse credentials from file contents
    pub fn parse(contents: &str) -> Result<Self> {
        let values = parse_key_values(contents);

        let access_key_id = values
            .get("aws_access_key_id")
            .ok_or_else(|| Error::missing_key("aws_access_key_id"))?
            .clone();
        let secret_access_key = values
            .get("aws_secret_access_key")
            .ok_or_else(|| Error::missing_key("aws_secret_access_key"))?
            .clone();

        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return Err(Error::config("Credential values must not be empty"));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// Export the credentials into the process environment
    ///
    /// Must run before any S3 store is built; the store builder reads
    /// the environment once at construction.
    pub fn export_to_env(&self) {
        std::env::set_var(AWS_ACCESS_KEY_ID, &self.access_key_id);
        std::env::set_var(AWS_SECRET_ACCESS_KEY, &self.secret_access_key);
    }
}

/// Parse `KEY = value` lines, ignoring `[section]` headers, comments
/// and blank lines. Keys are lowercased.
fn parse_key_values(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(
                key.trim().to_lowercase(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    }

    values
}
