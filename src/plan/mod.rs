// src/plan/mod.rs

//! Skip-vs-run decisions.
//!
//! - [`fingerprint`] computes static fingerprints over the graph.
//! - [`outdated`] compares them with the stores and applies cues.

pub mod fingerprint;
pub mod outdated;

pub use fingerprint::{TargetFingerprint, compute_fingerprints};
pub use outdated::{Plan, Staleness, StaleReason, build_plan, outdated};
