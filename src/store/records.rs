// src/store/records.rs

//! Persisted record types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::hash::hash_bytes;
use crate::types::StorageFormat;

/// A target's result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "data", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    Json(serde_json::Value),
    /// External file reference. `path` is relative to the workflow root.
    File { path: String, hash: String },
}

impl Value {
    pub fn format(&self) -> StorageFormat {
        match self {
            Value::Text(_) => StorageFormat::Text,
            Value::Json(_) => StorageFormat::Json,
            Value::File { .. } => StorageFormat::File,
        }
    }

    /// String form handed to dependents (environment variables).
    pub fn to_env_string(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Json(v) => v.to_string(),
            Value::File { path, .. } => path.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Json(v) => write!(f, "{:#}", v),
            Value::File { path, hash } => write!(f, "{path} (blake3 {hash})"),
        }
    }
}

/// How a target's last execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Errored { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Per-target bookkeeping written after every execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub fingerprint: String,
    /// Fingerprints of the direct dependencies at execution time.
    pub dependencies: BTreeMap<String, String>,
    /// Fingerprints of the tracked globals in the command's closure.
    pub globals: BTreeMap<String, String>,
    /// Object hashes of the dependency values the command was given.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    pub format: StorageFormat,
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
    /// Wall-clock execution time.
    pub seconds: f64,
}

/// Serialized result of a successful target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    pub value: Value,
    /// blake3 of the serialized value.
    pub hash: String,
    pub written_at: DateTime<Utc>,
}

impl ObjectRecord {
    pub fn new(name: &str, value: Value) -> Self {
        let hash = value_hash(&value);
        Self {
            name: name.to_string(),
            value,
            hash,
            written_at: Utc::now(),
        }
    }
}

/// Content hash of a value's canonical JSON serialization.
pub fn value_hash(value: &Value) -> String {
    // Serializing this enum cannot fail: every variant holds JSON-safe data.
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hash_bytes(&bytes)
}
