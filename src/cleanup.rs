// src/cleanup.rs

//! Destructive and selective store maintenance.
//!
//! | operation    | metadata | object | progress |
//! |--------------|----------|--------|----------|
//! | `destroy`    | all      | all    | all      |
//! | `prune`      | stale    | stale  | stale    |
//! | `delete`     | kept     | removed| kept     |
//! | `invalidate` | removed  | kept   | kept     |
//!
//! "Stale" means stored under a name the current workflow no longer declares.

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use crate::errors::Result;
use crate::store::Stores;
use crate::workflow::Workflow;

/// Which targets a `delete` / `invalidate` applies to.
#[derive(Debug, Clone)]
pub enum Selector {
    All,
    /// Explicit names plus glob patterns (`raw_*`).
    Matching { names: Vec<String>, patterns: GlobSet },
}

impl Selector {
    /// Build a selector from CLI-style arguments. Arguments containing glob
    /// metacharacters are patterns, everything else is a literal name.
    pub fn parse(args: &[String], all: bool) -> Result<Self> {
        if all {
            return Ok(Selector::All);
        }

        let mut names = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for arg in args {
            if arg.contains(['*', '?', '[', '{']) {
                let glob = Glob::new(arg).with_context(|| format!("invalid glob pattern: {arg}"))?;
                builder.add(glob);
            } else {
                names.push(arg.clone());
            }
        }
        let patterns = builder.build().context("building selector patterns")?;

        Ok(Selector::Matching { names, patterns })
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selector::Matching {
            names: names.into_iter().map(Into::into).collect(),
            patterns: GlobSet::empty(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Selector::All => true,
            Selector::Matching { names, patterns } => {
                names.iter().any(|n| n == name) || patterns.is_match(name)
            }
        }
    }

    fn select(&self, candidates: Vec<String>) -> Vec<String> {
        candidates.into_iter().filter(|n| self.matches(n)).collect()
    }
}

/// Remove every record of every target.
pub fn destroy(stores: &Stores) -> Result<()> {
    stores.clear()?;
    info!("destroyed all stores");
    Ok(())
}

/// Remove all records of targets no longer declared in `workflow`.
/// Returns the pruned names.
pub fn prune(workflow: &Workflow, stores: &Stores) -> Result<Vec<String>> {
    let mut names = stores.stored_names()?;
    names.extend(stores.progress_names()?);
    names.sort();
    names.dedup();

    let mut pruned = Vec::new();
    for name in names.into_iter().filter(|n| !workflow.contains(n)) {
        stores.delete_object(&name)?;
        stores.delete_metadata(&name)?;
        stores.delete_progress(&name)?;
        debug!(target = %name, "pruned");
        pruned.push(name);
    }

    info!(count = pruned.len(), "pruned obsolete targets");
    Ok(pruned)
}

/// Remove object records only. Metadata stays, so the next run sees the
/// object as missing and rebuilds. Returns the names whose object was removed.
pub fn delete(stores: &Stores, selector: &Selector) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in selector.select(stores.object_names()?) {
        if stores.delete_object(&name)? {
            debug!(target = %name, "deleted object");
            deleted.push(name);
        }
    }
    info!(count = deleted.len(), "deleted target data");
    Ok(deleted)
}

/// Remove metadata records only. Objects stay on disk and remain visible to
/// `Stores::raw_object`, but the standard read path reports them as
/// invalidated. Returns the names whose metadata was removed.
pub fn invalidate(stores: &Stores, selector: &Selector) -> Result<Vec<String>> {
    let mut invalidated = Vec::new();
    for name in selector.select(stores.metadata_names()?) {
        if stores.delete_metadata(&name)? {
            debug!(target = %name, "invalidated");
            invalidated.push(name);
        }
    }
    info!(count = invalidated.len(), "invalidated targets");
    Ok(invalidated)
}
