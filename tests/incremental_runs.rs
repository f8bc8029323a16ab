// tests/incremental_runs.rs

mod common;
use crate::common::builders::{TargetBuilder, WorkflowBuilder};
use crate::common::{TestResult, echo_behaviour, init_tracing, run_fake};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use targetdag::dag::ScheduledTarget;
use targetdag::engine::FinalStatus;
use targetdag::progress::read_progress;
use targetdag::store::{Stores, Value};
use targetdag::types::Cue;
use targetdag::workflow::Workflow;
use targetdag_test_utils::fake_executor::{Behaviour, describe};

/// A (no deps), B and C read A.
fn abc(a_command: &str) -> Workflow {
    WorkflowBuilder::new()
        .target("A", a_command)
        .target("B", "echo \"$A\" | wc -c")
        .target("C", "echo \"$A\" | tr a-z A-Z")
        .build()
}

#[tokio::test]
async fn first_run_builds_second_skips_edit_rebuilds() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let first = run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;
    let executed = first.executed();
    assert_eq!(executed[0], "A");
    assert_eq!(executed.len(), 3);
    assert_eq!(first.summary.built(), vec!["A", "B", "C"]);

    let second = run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;
    assert!(second.executed().is_empty());
    assert_eq!(second.summary.skipped(), vec!["A", "B", "C"]);
    assert!(second.summary.is_success());

    let third = run_fake(&abc("echo b"), &stores, echo_behaviour(), None).await?;
    assert_eq!(third.executed().len(), 3);
    assert_eq!(third.summary.built(), vec!["A", "B", "C"]);
    Ok(())
}

#[tokio::test]
async fn dependents_receive_upstream_values() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;

    assert_eq!(stores.read_value("A")?, Value::Text("A()".into()));
    assert_eq!(stores.read_value("B")?, Value::Text("B(A=A())".into()));
    Ok(())
}

#[tokio::test]
async fn skipped_upstream_still_feeds_rebuilt_downstream() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;

    // Only C changes.
    let wf = WorkflowBuilder::new()
        .target("A", "echo a")
        .target("B", "echo \"$A\" | wc -c")
        .target("C", "echo \"$A\" | tr a-z A-Z | rev")
        .build();
    let run = run_fake(&wf, &stores, echo_behaviour(), None).await?;

    assert_eq!(run.executed(), vec!["C"]);
    assert_eq!(run.summary.status_of("A"), Some(&FinalStatus::Skipped));
    let env = run.log.lock().unwrap().envs["C"].clone();
    assert_eq!(env.get("A"), Some(&Value::Text("A()".into())));
    Ok(())
}

#[tokio::test]
async fn global_helper_change_reruns_only_its_users() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let wf = |body: &str| {
        WorkflowBuilder::new()
            .function("main", "shout", body)
            .function("main", "outer", "shout \"$@\"")
            .target("raw", "echo raw")
            .target("loud", "echo \"$raw\" | outer")
            .target("quiet", "echo \"$raw\"")
            .build()
    };

    run_fake(&wf("tr a-z A-Z"), &stores, echo_behaviour(), None).await?;
    // `loud` only reaches `shout` through `outer`.
    let run = run_fake(&wf("tr a-z A-Z; echo !"), &stores, echo_behaviour(), None).await?;

    assert_eq!(run.executed(), vec!["loud"]);
    Ok(())
}

#[tokio::test]
async fn untracked_namespace_changes_are_ignored() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let wf = |body: &str| {
        WorkflowBuilder::new()
            .import("tracked")
            .function("tracked", "helper", "cat")
            .function("vendor", "fmt_num", body)
            .target("n", "echo 1 | helper | fmt_num")
            .build()
    };

    run_fake(&wf("cat"), &stores, echo_behaviour(), None).await?;
    let run = run_fake(&wf("sed s/1/one/"), &stores, echo_behaviour(), None).await?;
    assert!(run.executed().is_empty());
    Ok(())
}

#[tokio::test]
async fn cues_always_and_never() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let wf = |cmd: &str| {
        WorkflowBuilder::new()
            .target_def(TargetBuilder::new("frozen", cmd).cue(Cue::Never).build())
            .target_def(TargetBuilder::new("clock", "date").cue(Cue::Always).build())
            .build()
    };

    run_fake(&wf("echo 1"), &stores, echo_behaviour(), None).await?;
    let run = run_fake(&wf("echo 2"), &stores, echo_behaviour(), None).await?;

    assert_eq!(run.executed(), vec!["clock"]);
    assert_eq!(run.summary.status_of("frozen"), Some(&FinalStatus::Skipped));
    Ok(())
}

#[tokio::test]
async fn workers_bound_each_dispatch() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let mut builder = WorkflowBuilder::new().workers(2).target("root", "echo root");
    for i in 0..5 {
        builder = builder.target(&format!("leaf_{i}"), "echo \"$root\"");
    }
    let run = run_fake(&builder.build(), &stores, echo_behaviour(), None).await?;

    assert_eq!(run.executed().len(), 6);
    assert!(run.batches().iter().all(|b| b.len() <= 2));
    assert_eq!(run.batches()[1], vec!["leaf_0", "leaf_1"]);
    Ok(())
}

#[tokio::test]
async fn selection_runs_ancestors_only() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = WorkflowBuilder::new()
        .target("raw", "echo raw")
        .target("model", "echo \"$raw\"")
        .target("report", "echo \"$model\"")
        .target("other", "echo other")
        .build();

    let only = targetdag::resolve_selection(&wf, &["model".to_string()])?;
    let run = run_fake(&wf, &stores, echo_behaviour(), Some(only)).await?;

    assert_eq!(run.executed(), vec!["raw", "model"]);
    assert!(run.summary.status_of("report").is_none());
    assert!(targetdag::resolve_selection(&wf, &["nope".to_string()]).is_err());
    Ok(())
}

#[tokio::test]
async fn progress_is_terminal_after_run() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let run = run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;

    let snap = run.progress.snapshot();
    assert_eq!(snap.len(), 3);
    assert!(snap.values().all(|r| r.status.is_terminal()));
    assert!(snap.values().all(|r| r.started_at.is_some()));

    let persisted = targetdag::progress::read_progress(&stores)?;
    assert_eq!(persisted, snap);
    Ok(())
}

/// `A` prints `v<version>`; everything else echoes its inputs.
fn versioned_source(version: Arc<AtomicUsize>) -> Behaviour {
    Arc::new(move |t: &ScheduledTarget| {
        if t.name == "A" {
            Ok(Value::Text(format!("v{}", version.load(Ordering::SeqCst))))
        } else {
            Ok(Value::Text(describe(&t.name, &t.env)))
        }
    })
}

#[tokio::test]
async fn always_cued_upstream_with_new_value_rebuilds_readers() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = WorkflowBuilder::new()
        .target_def(TargetBuilder::new("A", "date +%s").cue(Cue::Always).build())
        .target("B", "echo \"$A\"")
        .target("C", "echo unrelated")
        .build();
    let version = Arc::new(AtomicUsize::new(0));

    run_fake(&wf, &stores, versioned_source(version.clone()), None).await?;
    assert_eq!(stores.read_value("B")?, Value::Text("B(A=v0)".into()));

    // Same value again: only A runs.
    let same = run_fake(&wf, &stores, versioned_source(version.clone()), None).await?;
    assert_eq!(same.executed(), vec!["A"]);
    assert_eq!(same.summary.status_of("B"), Some(&FinalStatus::Skipped));

    version.store(1, Ordering::SeqCst);
    let changed = run_fake(&wf, &stores, versioned_source(version.clone()), None).await?;
    assert_eq!(changed.executed(), vec!["A", "B"]);
    assert_eq!(stores.read_value("B")?, Value::Text("B(A=v1)".into()));
    assert_eq!(changed.summary.status_of("C"), Some(&FinalStatus::Skipped));
    Ok(())
}

#[tokio::test]
async fn deleted_upstream_rebuilt_differently_rebuilds_readers() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = WorkflowBuilder::new()
        .target("A", "date +%s")
        .target("B", "echo \"$A\"")
        .build();
    let version = Arc::new(AtomicUsize::new(0));

    run_fake(&wf, &stores, versioned_source(version.clone()), None).await?;
    stores.delete_object("A")?;
    version.store(7, Ordering::SeqCst);

    let run = run_fake(&wf, &stores, versioned_source(version.clone()), None).await?;
    assert_eq!(run.executed(), vec!["A", "B"]);
    assert_eq!(stores.read_value("B")?, Value::Text("B(A=v7)".into()));
    Ok(())
}

#[tokio::test]
async fn run_ids_continue_across_runs() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();

    let first = run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;
    let second = run_fake(&abc("echo a"), &stores, echo_behaviour(), None).await?;

    assert_eq!(first.summary.run_id, 1);
    assert_eq!(second.summary.run_id, 2);
    assert_eq!(stores.last_run_id()?, 2);
    Ok(())
}

#[tokio::test]
async fn selected_run_replaces_previous_progress() -> TestResult {
    init_tracing();
    let stores = Stores::in_memory();
    let wf = WorkflowBuilder::new()
        .target("raw", "echo raw")
        .target("model", "echo \"$raw\"")
        .target("report", "echo \"$model\"")
        .target("other", "echo other")
        .build();

    run_fake(&wf, &stores, echo_behaviour(), None).await?;
    assert_eq!(read_progress(&stores)?.len(), 4);

    let only = targetdag::resolve_selection(&wf, &["model".to_string()])?;
    run_fake(&wf, &stores, echo_behaviour(), Some(only)).await?;

    let progress = read_progress(&stores)?;
    assert_eq!(progress.keys().collect::<Vec<_>>(), vec!["model", "raw"]);
    Ok(())
}
