// src/config/validate.rs

use std::collections::HashSet;

use crate::analysis::scan::is_identifier;
use crate::config::model::{ConfigFile, MAIN_NAMESPACE, RawConfigFile};
use crate::errors::{Result, TargetdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TargetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.global, raw.target))
    }
}

/// Run every structural check on a raw workflow definition.
///
/// Cycle detection needs the analyzed dependency edges and therefore lives in
/// the graph builder (`dag::graph`).
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_targets(cfg)?;
    validate_global_config(cfg)?;
    validate_globals(cfg)?;
    validate_targets(cfg)?;
    validate_target_dependencies(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> TargetdagError {
    TargetdagError::ConfigError(msg.into())
}

fn ensure_has_targets(cfg: &RawConfigFile) -> Result<()> {
    if cfg.target.is_empty() {
        return Err(config_error(
            "workflow must contain at least one [[target]] entry",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(config_error("[config].workers must be >= 1 (got 0)"));
    }

    let mut seen = HashSet::new();
    for ns in cfg.config.imports.iter() {
        if ns == MAIN_NAMESPACE {
            return Err(config_error(format!(
                "[config].imports must not list '{MAIN_NAMESPACE}'; it is always tracked"
            )));
        }
        if !seen.insert(ns.as_str()) {
            return Err(config_error(format!(
                "[config].imports lists namespace '{ns}' more than once"
            )));
        }
    }

    Ok(())
}

fn validate_globals(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for global in cfg.global.iter() {
        if !is_identifier(&global.name) {
            return Err(config_error(format!(
                "global name '{}' is not a valid identifier",
                global.name
            )));
        }
        if global.namespace.trim().is_empty() {
            return Err(config_error(format!(
                "global '{}' has an empty namespace",
                global.name
            )));
        }
        match (&global.function, &global.value) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(config_error(format!(
                    "global '{}::{}' must set exactly one of `function` or `value`",
                    global.namespace, global.name
                )));
            }
        }
        if !seen.insert((global.namespace.as_str(), global.name.as_str())) {
            return Err(config_error(format!(
                "global '{}::{}' is declared more than once",
                global.namespace, global.name
            )));
        }
    }

    Ok(())
}

fn validate_targets(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for target in cfg.target.iter() {
        if !is_identifier(&target.name) {
            return Err(config_error(format!(
                "target name '{}' is not a valid identifier",
                target.name
            )));
        }
        if !seen.insert(target.name.as_str()) {
            return Err(config_error(format!(
                "target '{}' is declared more than once",
                target.name
            )));
        }
        if target.command.trim().is_empty() {
            return Err(config_error(format!(
                "target '{}' has an empty command",
                target.name
            )));
        }
    }

    Ok(())
}

fn validate_target_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let names: HashSet<&str> = cfg.target.iter().map(|t| t.name.as_str()).collect();

    for target in cfg.target.iter() {
        for dep in target.after.iter() {
            if dep == &target.name {
                return Err(config_error(format!(
                    "target '{}' cannot depend on itself in `after`",
                    target.name
                )));
            }
            if !names.contains(dep.as_str()) {
                return Err(config_error(format!(
                    "target '{}' has unknown dependency '{}' in `after`",
                    target.name, dep
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> RawConfigFile {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn rejects_empty_workflow() {
        let raw = parse("[config]\nworkers = 1\n");
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, TargetdagError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn rejects_zero_workers() {
        let raw = parse(
            r#"
[config]
workers = 0

[[target]]
name = "a"
command = "echo a"
"#,
        );
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_global_with_both_function_and_value() {
        let raw = parse(
            r#"
[[global]]
name = "f"
function = "echo"
value = "1"

[[target]]
name = "a"
command = "f"
"#,
        );
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn rejects_main_in_imports() {
        let raw = parse(
            r#"
[config]
imports = ["main"]

[[target]]
name = "a"
command = "echo a"
"#,
        );
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_duplicate_and_invalid_target_names() {
        let dup = parse(
            r#"
[[target]]
name = "a"
command = "echo 1"

[[target]]
name = "a"
command = "echo 2"
"#,
        );
        assert!(ConfigFile::try_from(dup).is_err());

        let invalid = parse(
            r#"
[[target]]
name = "has-dash"
command = "echo 1"
"#,
        );
        assert!(ConfigFile::try_from(invalid).is_err());
    }

    #[test]
    fn accepts_defaults() {
        let raw = parse(
            r#"
[[target]]
name = "a"
command = "echo a"
"#,
        );
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.config.workers, 1);
        assert_eq!(cfg.config.store, std::path::PathBuf::from(".targetdag"));
        assert_eq!(cfg.target[0].format, crate::types::StorageFormat::Text);
    }
}
