// tests/config_errors.rs

mod common;
use crate::common::builders::RawConfigBuilder;
use crate::common::{TestResult, init_tracing, write_workflow};

use targetdag::config::{GlobalConfig, ConfigFile, load_workflow, parse_str, validate_config};
use targetdag::errors::TargetdagError;
use targetdag::types::{BackendKind, ErrorPolicy};

fn config_message(err: TargetdagError) -> String {
    match err {
        TargetdagError::ConfigError(msg) => msg,
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn loads_full_workflow_file() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
[config]
workers = 3
error = "stop"
imports = ["helpers"]
backend = "memory"

[[global]]
namespace = "helpers"
name = "strip"
function = "tr -d ' '"

[[global]]
name = "sep"
value = ","

[[target]]
name = "raw"
command = "cat data.csv"

[[target]]
name = "clean"
command = "echo \"$raw\" | strip | cut -d \"$sep\" -f1"
format = "json"
cue = "always"
"#,
    );

    let wf = load_workflow(&path)?;
    assert_eq!(wf.settings.workers, 3);
    assert_eq!(wf.settings.error_policy, ErrorPolicy::Stop);
    assert_eq!(wf.store.backend, BackendKind::Memory);
    assert_eq!(wf.store.dir, dir.path().join(".targetdag"));
    assert_eq!(wf.root_dir, dir.path());

    let deps = wf.dependencies("clean").expect("clean is declared");
    assert_eq!(deps.targets, vec!["raw"]);
    assert_eq!(deps.globals, vec!["helpers::strip", "main::sep"]);
    assert_eq!(wf.graph().topo_order(), ["raw", "clean"]);
    Ok(())
}

#[test]
fn analyzed_cycle_is_fatal() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
[[target]]
name = "ok"
command = "echo fine"

[[target]]
name = "ping"
command = "echo \"$pong\""

[[target]]
name = "pong"
command = "echo \"$ping\""
"#,
    );

    match load_workflow(&path) {
        Err(TargetdagError::Cycle(members)) => assert_eq!(members, vec!["ping", "pong"]),
        other => panic!("expected a cycle, got {other:?}"),
    }
    Ok(())
}

#[test]
fn cycle_through_after_is_fatal() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
[[target]]
name = "a"
command = "echo a"
after = ["b"]

[[target]]
name = "b"
command = "echo \"$a\""
"#,
    );

    assert!(matches!(
        load_workflow(&path),
        Err(TargetdagError::Cycle(_))
    ));
    Ok(())
}

#[test]
fn malformed_toml_is_reported() {
    assert!(matches!(
        parse_str("[[target]\nname = "),
        Err(TargetdagError::TomlError(_))
    ));
    assert!(matches!(
        parse_str("[[target]]\nname = \"a\"\ncommand = \"x\"\nformat = \"yaml\"\n"),
        Err(TargetdagError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_workflow(dir.path().join("nope.toml")),
        Err(TargetdagError::IoError(_))
    ));
}

#[test]
fn structural_checks() {
    let empty = RawConfigBuilder::new().build();
    assert!(config_message(validate_config(&empty).unwrap_err()).contains("at least one"));

    let dup = RawConfigBuilder::new()
        .target("a", "echo 1")
        .target("a", "echo 2")
        .build();
    assert!(config_message(validate_config(&dup).unwrap_err()).contains("more than once"));

    let bad_name = RawConfigBuilder::new().target("not-valid", "echo").build();
    assert!(
        config_message(validate_config(&bad_name).unwrap_err()).contains("valid identifier")
    );

    let unknown_after = RawConfigBuilder::new()
        .target_after("a", "echo", &["ghost"])
        .build();
    assert!(
        config_message(validate_config(&unknown_after).unwrap_err())
            .contains("unknown dependency 'ghost'")
    );

    let zero_workers = RawConfigBuilder::new().target("a", "echo").workers(0).build();
    assert!(config_message(validate_config(&zero_workers).unwrap_err()).contains("workers"));

    let main_import = RawConfigBuilder::new()
        .target("a", "echo")
        .imports(&["main"])
        .build();
    assert!(ConfigFile::try_from(main_import).is_err());
}

#[test]
fn global_needs_exactly_one_body() {
    let both = RawConfigBuilder::new()
        .target("a", "echo")
        .global(GlobalConfig {
            namespace: "main".into(),
            name: "g".into(),
            function: Some("echo".into()),
            value: Some("1".into()),
        })
        .build();
    assert!(config_message(validate_config(&both).unwrap_err()).contains("exactly one"));

    let neither = RawConfigBuilder::new()
        .target("a", "echo")
        .global(GlobalConfig {
            namespace: "main".into(),
            name: "g".into(),
            function: None,
            value: None,
        })
        .build();
    assert!(validate_config(&neither).is_err());
}

#[test]
fn targets_shadow_globals_of_the_same_name() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_workflow(
        dir.path(),
        r#"
[[global]]
name = "clean"
function = "sed 's/x//'"

[[target]]
name = "clean"
command = "echo cleaned"

[[target]]
name = "report"
command = "echo \"$clean\""
"#,
    );

    let wf = load_workflow(&path)?;
    let deps = wf.dependencies("report").expect("report is declared");
    assert_eq!(deps.targets, vec!["clean"]);
    assert!(deps.globals.is_empty());
    Ok(())
}
