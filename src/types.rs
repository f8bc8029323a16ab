use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happens to the rest of a run when a target errors.
///
/// - `Continue`: cancel the failed target's descendants; independent
///   branches keep running (default).
/// - `Stop`: additionally cancel every target that has not started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Continue,
    Stop,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(ErrorPolicy::Continue),
            "stop" => Ok(ErrorPolicy::Stop),
            other => Err(format!(
                "invalid error policy: {other} (expected \"continue\" or \"stop\")"
            )),
        }
    }
}

/// How a target's result is captured and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Stdout as UTF-8 text.
    #[default]
    Text,
    /// Stdout parsed as JSON.
    Json,
    /// Stdout names a file; the file's hash is tracked.
    File,
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageFormat::Text => "text",
            StorageFormat::Json => "json",
            StorageFormat::File => "file",
        };
        f.write_str(s)
    }
}

/// Rule deciding when a target counts as up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cue {
    /// Compare fingerprints and check the stored object (default).
    #[default]
    Thorough,
    /// Always rerun.
    Always,
    /// Reuse any successful stored result regardless of fingerprint.
    Never,
}

/// Which key-value backend holds the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file per record under the store directory.
    #[default]
    File,
    /// In memory only (lost on exit).
    Memory,
}
