// src/lib.rs

pub mod analysis;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod plan;
pub mod progress;
pub mod store;
pub mod types;
pub mod workflow;

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::analysis::analyze_command;
use crate::cleanup::Selector;
use crate::cli::{CliArgs, Command, DepsArgs, RunArgs};
use crate::config::load_workflow;
use crate::errors::TargetdagError;
use crate::fs::RealFileSystem;
use crate::plan::{Staleness, build_plan};
use crate::store::Stores;

pub use crate::engine::runtime::{resolve_selection, run_workflow};
pub use crate::engine::{FinalStatus, RunSummary};
pub use crate::workflow::{TargetDef, Workflow};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the workflow (cycle and configuration errors are
/// fatal here, before anything executes), opens the stores and dispatches
/// the subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut workflow = load_workflow(&args.config)?;
    let stores = Stores::open(&workflow.store);
    debug!(store = ?workflow.store.dir, backend = ?workflow.store.backend, "opened stores");

    match args.command {
        Command::Run(run_args) => {
            apply_run_overrides(&mut workflow, &run_args)?;
            let summary =
                run_workflow(Arc::new(workflow), stores, run_args.names.as_deref()).await?;
            println!("{summary}");
            if !summary.is_success() {
                bail!(
                    "{} target(s) errored, {} canceled",
                    summary.errored().len(),
                    summary.canceled().len()
                );
            }
        }
        Command::Outdated => {
            for name in plan::outdated(&workflow, &stores, &RealFileSystem)? {
                println!("{name}");
            }
        }
        Command::Manifest => print_manifest(&workflow, &stores)?,
        Command::Deps(deps) => print_deps(&workflow, &deps)?,
        Command::Read { target } => {
            if !workflow.contains(&target) {
                info!(target = %target, "reading a target that is not declared");
            }
            println!("{}", stores.read_value(&target)?);
        }
        Command::Meta => {
            for name in stores.metadata_names()? {
                let Some(meta) = stores.read_metadata(&name)? else {
                    continue;
                };
                let outcome = match &meta.outcome {
                    store::Outcome::Success => "success".to_string(),
                    store::Outcome::Errored { message } => format!("errored: {message}"),
                };
                println!(
                    "{name}\t{}\t{}\t{:.2}s\t{outcome}",
                    short(&meta.fingerprint),
                    meta.recorded_at.to_rfc3339(),
                    meta.seconds
                );
            }
        }
        Command::Progress => {
            for (name, record) in progress::read_progress(&stores)? {
                let started = record
                    .started_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                let finished = record
                    .finished_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{name}\t{}\t{started}\t{finished}", record.status);
            }
        }
        Command::Destroy => cleanup::destroy(&stores)?,
        Command::Prune => {
            for name in cleanup::prune(&workflow, &stores)? {
                println!("pruned {name}");
            }
        }
        Command::Delete(sel) => {
            let selector = Selector::parse(&sel.selectors, sel.all)?;
            for name in cleanup::delete(&stores, &selector)? {
                println!("deleted {name}");
            }
        }
        Command::Invalidate(sel) => {
            let selector = Selector::parse(&sel.selectors, sel.all)?;
            for name in cleanup::invalidate(&stores, &selector)? {
                println!("invalidated {name}");
            }
        }
    }

    Ok(())
}

fn apply_run_overrides(workflow: &mut Workflow, args: &RunArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(TargetdagError::ConfigError("--workers must be >= 1".to_string()).into());
        }
        workflow.settings.workers = workers;
    }
    if let Some(policy) = args.error {
        workflow.settings.error_policy = policy;
    }
    info!(
        workers = workflow.settings.workers,
        error_policy = ?workflow.settings.error_policy,
        "run settings"
    );
    Ok(())
}

/// Print every target with its command, dependencies and fingerprint.
/// Nothing is executed.
fn print_manifest(workflow: &Workflow, stores: &Stores) -> Result<()> {
    let plan = build_plan(workflow, stores, &RealFileSystem)?;

    println!(
        "tracked namespaces: {}",
        workflow.symbols().tracked_namespaces().join(", ")
    );
    println!("targets ({}):", workflow.targets().len());
    for name in workflow.graph().targets() {
        let Some(def) = workflow.target(name) else {
            continue;
        };
        println!("  - {name}");
        if let Some(description) = &def.description {
            println!("      description: {description}");
        }
        println!("      command: {}", def.command);
        println!("      format: {}", def.format);
        if let Some(deps) = workflow.dependencies(name) {
            if !deps.targets.is_empty() {
                println!("      depends on: {}", deps.targets.join(", "));
            }
            if !deps.globals.is_empty() {
                println!("      globals: {}", deps.globals.join(", "));
            }
        }
        if let Some(fp) = plan.fingerprint(name) {
            println!("      fingerprint: {}", short(&fp.fingerprint));
        }
        match plan.staleness.get(name) {
            Some(Staleness::UpToDate) => println!("      status: up to date"),
            Some(Staleness::Outdated(reason)) => println!("      status: outdated ({reason})"),
            None => {}
        }
    }
    Ok(())
}

fn print_deps(workflow: &Workflow, args: &DepsArgs) -> Result<()> {
    let deps = match (&args.target, &args.command) {
        (_, Some(source)) => analyze_command(source, workflow.symbols(), None),
        (Some(target), None) => workflow
            .dependencies(target)
            .cloned()
            .ok_or_else(|| TargetdagError::UnresolvedReference(target.clone()))?,
        (None, None) => bail!("either a target or --command is required"),
    };

    for target in &deps.targets {
        println!("target\t{target}");
    }
    for global in &deps.globals {
        println!("global\t{global}");
    }
    Ok(())
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
