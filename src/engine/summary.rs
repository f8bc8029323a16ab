// src/engine/summary.rs

//! Result of a run, as returned to library callers and printed by the CLI.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::engine::TargetName;

/// Final status of one target in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FinalStatus {
    Built,
    Skipped,
    Errored { message: String },
    Canceled,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStatus::Built => f.write_str("built"),
            FinalStatus::Skipped => f.write_str("skipped"),
            FinalStatus::Errored { message } => write!(f, "errored: {message}"),
            FinalStatus::Canceled => f.write_str("canceled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSummary {
    pub name: TargetName,
    pub status: FinalStatus,
    /// Execution time, for targets that ran.
    pub seconds: Option<f64>,
}

/// Every participating target with its final status, in topological order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub targets: Vec<TargetSummary>,
}

impl RunSummary {
    /// Assemble a summary in `order`, ignoring names without a status.
    pub(crate) fn collect<'a>(
        run_id: u64,
        order: impl Iterator<Item = &'a str>,
        mut statuses: HashMap<TargetName, (FinalStatus, Option<f64>)>,
    ) -> Self {
        let targets = order
            .filter_map(|name| {
                let (status, seconds) = statuses.remove(name)?;
                Some(TargetSummary {
                    name: name.to_string(),
                    status,
                    seconds,
                })
            })
            .collect();
        Self { run_id, targets }
    }

    pub fn status_of(&self, name: &str) -> Option<&FinalStatus> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.status)
    }

    /// Names with the given status kind, in topological order.
    pub fn names_where(&self, pred: impl Fn(&FinalStatus) -> bool) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| pred(&t.status))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn built(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, FinalStatus::Built))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, FinalStatus::Skipped))
    }

    pub fn errored(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, FinalStatus::Errored { .. }))
    }

    pub fn canceled(&self) -> Vec<&str> {
        self.names_where(|s| matches!(s, FinalStatus::Canceled))
    }

    /// No target errored or was canceled.
    pub fn is_success(&self) -> bool {
        self.errored().is_empty() && self.canceled().is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}:", self.run_id)?;
        for t in &self.targets {
            match t.seconds {
                Some(secs) => writeln!(f, "  {:<24} {} ({secs:.2}s)", t.name, t.status)?,
                None => writeln!(f, "  {:<24} {}", t.name, t.status)?,
            }
        }
        write!(
            f,
            "{} built, {} skipped, {} errored, {} canceled",
            self.built().len(),
            self.skipped().len(),
            self.errored().len(),
            self.canceled().len()
        )
    }
}
