// tests/cleanup_operations.rs

mod common;
use crate::common::builders::WorkflowBuilder;
use crate::common::{TestResult, echo_behaviour, init_tracing, run_fake};

use targetdag::cleanup::{self, Selector};
use targetdag::errors::TargetdagError;
use targetdag::progress::read_progress;
use targetdag::store::Stores;
use targetdag::workflow::Workflow;

fn chain() -> Workflow {
    WorkflowBuilder::new()
        .target("raw_a", "cat a.csv")
        .target("raw_b", "cat b.csv")
        .target("merged", "paste \"$raw_a\" \"$raw_b\"")
        .build()
}

#[tokio::test]
async fn invalidated_target_is_rebuilt() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = chain();
    run_fake(&wf, &stores, echo_behaviour(), None).await?;

    let done = cleanup::invalidate(&stores, &Selector::names(["raw_a"]))?;
    assert_eq!(done, vec!["raw_a"]);

    assert!(matches!(
        stores.read_value("raw_a"),
        Err(TargetdagError::Invalidated(_))
    ));
    assert!(stores.raw_object("raw_a")?.is_some());

    let run = run_fake(&wf, &stores, echo_behaviour(), None).await?;
    // `merged` keeps its fingerprint, so only the invalidated target runs.
    assert_eq!(run.executed(), vec!["raw_a"]);
    assert!(stores.read_value("raw_a").is_ok());
    Ok(())
}

#[tokio::test]
async fn deleted_objects_are_rebuilt() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = chain();
    run_fake(&wf, &stores, echo_behaviour(), None).await?;

    let sel = Selector::parse(&["raw_*".to_string()], false)?;
    assert_eq!(cleanup::delete(&stores, &sel)?, vec!["raw_a", "raw_b"]);
    assert!(matches!(
        stores.read_value("raw_b"),
        Err(TargetdagError::StoreInconsistency { .. })
    ));

    let run = run_fake(&wf, &stores, echo_behaviour(), None).await?;
    assert_eq!(run.executed(), vec!["raw_a", "raw_b"]);
    assert_eq!(run.summary.skipped(), vec!["merged"]);
    Ok(())
}

#[tokio::test]
async fn prune_drops_records_of_removed_targets() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    run_fake(&chain(), &stores, echo_behaviour(), None).await?;

    let smaller = WorkflowBuilder::new()
        .target("raw_a", "cat a.csv")
        .build();
    let pruned = cleanup::prune(&smaller, &stores)?;

    assert_eq!(pruned, vec!["merged", "raw_b"]);
    assert_eq!(stores.stored_names()?, vec!["raw_a"]);
    assert!(!read_progress(&stores)?.contains_key("merged"));

    let run = run_fake(&smaller, &stores, echo_behaviour(), None).await?;
    assert!(run.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn destroy_forces_full_rebuild() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = chain();
    run_fake(&wf, &stores, echo_behaviour(), None).await?;

    cleanup::destroy(&stores)?;
    assert!(read_progress(&stores)?.is_empty());

    let run = run_fake(&wf, &stores, echo_behaviour(), None).await?;
    assert_eq!(run.summary.built(), vec!["raw_a", "raw_b", "merged"]);
    Ok(())
}
