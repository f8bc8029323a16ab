// src/store/mod.rs

//! Metadata Store and Object Store.
//!
//! - [`backend`] holds the key-value abstraction and its implementations.
//! - [`records`] defines the persisted record types.
//! - [`hash`] provides blake3 helpers shared with `file` targets.
//!
//! [`Stores`] exposes the two logical stores over one backend. The standard
//! read path ([`Stores::read_value`]) consults metadata first; objects whose
//! metadata is gone are invisible to it but remain reachable through
//! [`Stores::raw_object`].

pub mod backend;
pub mod hash;
pub mod records;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, TargetdagError};
use crate::fs::RealFileSystem;
use crate::types::BackendKind;
use crate::workflow::StoreSettings;

pub use backend::{Backend, FileBackend, MemoryBackend, Namespace};
pub use records::{MetadataRecord, ObjectRecord, Outcome, Value};

const RUN_COUNTER_KEY: &str = "counter";

#[derive(Debug, Serialize, Deserialize)]
struct RunCounter {
    last_run_id: u64,
}

/// Cheaply cloneable handle to the stores.
#[derive(Debug, Clone)]
pub struct Stores {
    backend: Arc<dyn Backend>,
}

impl Stores {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Open the backend described by the workflow's store settings.
    pub fn open(settings: &StoreSettings) -> Self {
        let backend: Arc<dyn Backend> = match settings.backend {
            BackendKind::File => Arc::new(FileBackend::new(settings.dir.clone(), RealFileSystem)),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        Self::new(backend)
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    // ---- Metadata Store -------------------------------------------------

    pub fn read_metadata(&self, name: &str) -> Result<Option<MetadataRecord>> {
        self.get_json(Namespace::Meta, name)
    }

    pub fn write_metadata(&self, record: &MetadataRecord) -> Result<()> {
        self.put_json(Namespace::Meta, &record.name, record)
    }

    pub fn delete_metadata(&self, name: &str) -> Result<bool> {
        Ok(self.backend.delete(Namespace::Meta, name)?)
    }

    pub fn metadata_names(&self) -> Result<Vec<String>> {
        Ok(self.backend.keys(Namespace::Meta)?)
    }

    // ---- Object Store ---------------------------------------------------

    /// Direct object lookup that ignores metadata.
    pub fn raw_object(&self, name: &str) -> Result<Option<ObjectRecord>> {
        self.get_json(Namespace::Objects, name)
    }

    pub fn write_object(&self, record: &ObjectRecord) -> Result<()> {
        self.put_json(Namespace::Objects, &record.name, record)
    }

    pub fn delete_object(&self, name: &str) -> Result<bool> {
        Ok(self.backend.delete(Namespace::Objects, name)?)
    }

    pub fn object_names(&self) -> Result<Vec<String>> {
        Ok(self.backend.keys(Namespace::Objects)?)
    }

    /// Standard object read: fails with `StoreInconsistency` when metadata
    /// reports success but the object is missing.
    pub fn read_object(&self, name: &str) -> Result<ObjectRecord> {
        match self.read_metadata(name)? {
            None => match self.raw_object(name)? {
                Some(_) => Err(TargetdagError::Invalidated(name.to_string())),
                None => Err(TargetdagError::NeverBuilt(name.to_string())),
            },
            Some(meta) => match meta.outcome {
                Outcome::Errored { message } => Err(TargetdagError::TargetErrored {
                    target: name.to_string(),
                    message,
                }),
                Outcome::Success => {
                    self.raw_object(name)?
                        .ok_or_else(|| TargetdagError::StoreInconsistency {
                            target: name.to_string(),
                            message: "metadata records success but the object is missing"
                                .to_string(),
                        })
                }
            },
        }
    }

    /// Read a target's current value through the standard path.
    pub fn read_value(&self, name: &str) -> Result<Value> {
        self.read_object(name).map(|obj| obj.value)
    }

    /// Names present in either store, sorted.
    pub fn stored_names(&self) -> Result<Vec<String>> {
        let mut names = self.metadata_names()?;
        names.extend(self.object_names()?);
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Write a successful result: object first, then metadata.
    ///
    /// A crash between the two leaves an object without metadata, which the
    /// read path treats as invalidated and the next run rebuilds.
    pub fn record_success(&self, object: &ObjectRecord, meta: &MetadataRecord) -> Result<()> {
        self.write_object(object)?;
        self.write_metadata(meta)?;
        info!(target = %meta.name, fingerprint = %meta.fingerprint, "stored target result");
        Ok(())
    }

    /// Write a failed result: metadata only.
    pub fn record_error(&self, meta: &MetadataRecord) -> Result<()> {
        self.write_metadata(meta)?;
        debug!(target = %meta.name, "stored error metadata");
        Ok(())
    }

    // ---- Run counter ----------------------------------------------------

    /// ID of the most recent run recorded in this store (0 if none).
    pub fn last_run_id(&self) -> Result<u64> {
        Ok(self
            .get_json::<RunCounter>(Namespace::Runs, RUN_COUNTER_KEY)?
            .map_or(0, |c| c.last_run_id))
    }

    pub fn write_last_run_id(&self, last_run_id: u64) -> Result<()> {
        self.put_json(Namespace::Runs, RUN_COUNTER_KEY, &RunCounter { last_run_id })
    }

    // ---- Progress records -----------------------------------------------

    pub(crate) fn put_progress<T: Serialize>(&self, name: &str, record: &T) -> Result<()> {
        self.put_json(Namespace::Progress, name, record)
    }

    pub(crate) fn get_progress<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.get_json(Namespace::Progress, name)
    }

    pub(crate) fn progress_names(&self) -> Result<Vec<String>> {
        Ok(self.backend.keys(Namespace::Progress)?)
    }

    pub(crate) fn delete_progress(&self, name: &str) -> Result<bool> {
        Ok(self.backend.delete(Namespace::Progress, name)?)
    }

    pub(crate) fn clear(&self) -> Result<()> {
        Ok(self.backend.clear()?)
    }

    fn get_json<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Result<Option<T>> {
        match self.backend.get(ns, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, ns: Namespace, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.backend.put(ns, key, &bytes)?;
        Ok(())
    }
}
