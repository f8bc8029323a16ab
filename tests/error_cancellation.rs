// tests/error_cancellation.rs

mod common;
use crate::common::builders::WorkflowBuilder;
use crate::common::{TestResult, echo_behaviour, failing_behaviour, init_tracing, run_fake};

use targetdag::engine::FinalStatus;
use targetdag::errors::TargetdagError;
use targetdag::progress::ProgressStatus;
use targetdag::store::{Outcome, Stores};
use targetdag::types::ErrorPolicy;
use targetdag::workflow::Workflow;

/// raw -> clean -> model -> report, plus an independent `docs` branch.
fn pipeline(policy: ErrorPolicy) -> Workflow {
    WorkflowBuilder::new()
        .error_policy(policy)
        .target("raw", "cat data.csv")
        .target("clean", "echo \"$raw\" | sort")
        .target("model", "echo \"$clean\" | wc -l")
        .target("report", "echo \"$model\"")
        .target("docs", "echo docs")
        .target("docs_index", "echo \"$docs\"")
        .build()
}

#[tokio::test]
async fn error_cancels_descendants_and_spares_the_rest() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let run = run_fake(
        &pipeline(ErrorPolicy::Continue),
        &stores,
        failing_behaviour(&["clean"]),
        None,
    )
    .await?;
    let s = &run.summary;

    assert_eq!(s.built(), vec!["raw", "docs", "docs_index"]);
    assert_eq!(s.errored(), vec!["clean"]);
    assert_eq!(s.canceled(), vec!["model", "report"]);
    assert!(!s.is_success());
    assert!(!run.executed().contains(&"model".to_string()));
    Ok(())
}

#[tokio::test]
async fn errored_target_records_metadata_only() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    run_fake(
        &pipeline(ErrorPolicy::Continue),
        &stores,
        failing_behaviour(&["clean"]),
        None,
    )
    .await?;

    let meta = stores.read_metadata("clean")?.expect("metadata written");
    assert!(matches!(meta.outcome, Outcome::Errored { ref message } if message.contains("on purpose")));
    assert!(stores.raw_object("clean")?.is_none());
    assert!(matches!(
        stores.read_value("clean"),
        Err(TargetdagError::TargetErrored { .. })
    ));

    // Canceled targets leave no trace in either store.
    assert!(stores.read_metadata("model")?.is_none());
    assert!(stores.raw_object("model")?.is_none());
    Ok(())
}

#[tokio::test]
async fn stop_policy_cancels_everything_not_started() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let run = run_fake(
        &pipeline(ErrorPolicy::Stop),
        &stores,
        failing_behaviour(&["raw"]),
        None,
    )
    .await?;

    assert_eq!(run.executed(), vec!["raw"]);
    assert_eq!(
        run.summary.canceled(),
        vec!["clean", "model", "report", "docs", "docs_index"]
    );
    Ok(())
}

#[tokio::test]
async fn failed_target_reruns_and_recovers() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = pipeline(ErrorPolicy::Continue);

    run_fake(&wf, &stores, failing_behaviour(&["clean"]), None).await?;
    let run = run_fake(&wf, &stores, echo_behaviour(), None).await?;

    assert_eq!(run.executed(), vec!["clean", "model", "report"]);
    assert_eq!(run.summary.status_of("raw"), Some(&FinalStatus::Skipped));
    assert!(run.summary.is_success());
    Ok(())
}

#[tokio::test]
async fn progress_marks_errored_and_canceled() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let run = run_fake(
        &pipeline(ErrorPolicy::Continue),
        &stores,
        failing_behaviour(&["model"]),
        None,
    )
    .await?;

    let snap = run.progress.snapshot();
    assert_eq!(snap["model"].status, ProgressStatus::Errored);
    assert_eq!(snap["report"].status, ProgressStatus::Canceled);
    assert!(snap["report"].started_at.is_none());
    assert_eq!(snap["docs_index"].status, ProgressStatus::Success);
    Ok(())
}
