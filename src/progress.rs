// src/progress.rs

//! Live progress of a run.
//!
//! The runtime writes transitions into a [`ProgressBoard`]; readers take
//! snapshots at any time. Records are replaced whole under a lock so a
//! reader never sees a half-updated record. Every transition is also
//! persisted to the `progress` store namespace, which is what
//! `targetdag progress` reads from another process.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::Result;
use crate::store::Stores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Queued,
    Running,
    Success,
    Skipped,
    Canceled,
    Errored,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressStatus::Queued | ProgressStatus::Running)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressStatus::Queued => "queued",
            ProgressStatus::Running => "running",
            ProgressStatus::Success => "success",
            ProgressStatus::Skipped => "skipped",
            ProgressStatus::Canceled => "canceled",
            ProgressStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: ProgressStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    fn queued() -> Self {
        Self {
            status: ProgressStatus::Queued,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Shared, cheaply cloneable progress view.
#[derive(Debug, Clone)]
pub struct ProgressBoard {
    records: Arc<RwLock<BTreeMap<String, ProgressRecord>>>,
    stores: Option<Stores>,
}

impl ProgressBoard {
    /// A board that also persists every transition into `stores`.
    pub fn new(stores: Stores) -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            stores: Some(stores),
        }
    }

    /// A purely in-process board.
    pub fn detached() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            stores: None,
        }
    }

    /// Mark `names` as queued, dropping every record the previous run left,
    /// including those of targets outside this run.
    pub fn reset<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        if let Some(stores) = &self.stores {
            if let Err(e) = clear_persisted(stores) {
                warn!(error = %e, "failed to clear persisted progress");
            }
        }
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        for name in names {
            self.replace(name, ProgressRecord::queued());
        }
    }

    pub fn mark_running(&self, name: &str) {
        self.replace(
            name,
            ProgressRecord {
                status: ProgressStatus::Running,
                started_at: Some(Utc::now()),
                finished_at: None,
            },
        );
    }

    /// Record a terminal status, keeping the start time if there was one.
    pub fn mark_finished(&self, name: &str, status: ProgressStatus) {
        let started_at = self.get(name).and_then(|r| r.started_at);
        self.replace(
            name,
            ProgressRecord {
                status,
                started_at,
                finished_at: Some(Utc::now()),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ProgressRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(name).cloned()
    }

    /// Point-in-time copy of every record.
    pub fn snapshot(&self) -> BTreeMap<String, ProgressRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.clone()
    }

    fn replace(&self, name: &str, record: ProgressRecord) {
        if let Some(stores) = &self.stores {
            if let Err(e) = stores.put_progress(name, &record) {
                warn!(target = %name, error = %e, "failed to persist progress record");
            }
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(name.to_string(), record);
    }
}

fn clear_persisted(stores: &Stores) -> Result<()> {
    for name in stores.progress_names()? {
        stores.delete_progress(&name)?;
    }
    Ok(())
}

/// Read the persisted progress of the latest run.
pub fn read_progress(stores: &Stores) -> Result<BTreeMap<String, ProgressRecord>> {
    let mut out = BTreeMap::new();
    for name in stores.progress_names()? {
        if let Some(record) = stores.get_progress::<ProgressRecord>(&name)? {
            out.insert(name, record);
        }
    }
    Ok(out)
}
