// src/analysis/mod.rs

//! Static dependency analysis.
//!
//! - [`scan`] extracts identifier-shaped words from command source.
//! - [`symbols`] holds the explicit symbol table (targets + globals) and the
//!   namespace precedence rules.
//!
//! [`analyze_command`] restricts a command's words to the symbol table and
//! closes over the globals those words reach: if a target calls `f` and `f`
//! calls `g`, both are reported, because editing `g` must rerun the target.
//! Words the table does not know (ordinary programs like `cat` or `sed`)
//! are ignored.

pub mod scan;
pub mod symbols;

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

pub use symbols::{GlobalKind, GlobalObject, Symbol, SymbolTable};

/// Dependencies found for one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    /// Referenced target names, sorted.
    pub targets: Vec<String>,
    /// Qualified names (`namespace::name`) of every global reached directly
    /// or through other globals, sorted.
    pub globals: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.globals.is_empty()
    }
}

/// Raw dependency query: symbols in `source` that the table knows about,
/// in order of first appearance. No closure over globals.
pub fn referenced_symbols(source: &str, symbols: &SymbolTable) -> Vec<String> {
    scan::identifiers(source)
        .into_iter()
        .filter(|word| symbols.resolve(word).is_some())
        .collect()
}

/// Full analysis of a target command.
///
/// `own_name` is dropped from the result so a command mentioning its own
/// target never produces a self-loop.
pub fn analyze_command(
    source: &str,
    symbols: &SymbolTable,
    own_name: Option<&str>,
) -> Dependencies {
    let mut targets = BTreeSet::new();
    let mut roots = Vec::new();

    for word in scan::identifiers(source) {
        match symbols.resolve(&word) {
            Some(Symbol::Target(name)) if Some(name) != own_name => {
                targets.insert(name.to_string());
            }
            Some(Symbol::Target(_)) => {}
            Some(Symbol::Global(global)) => roots.push(global),
            None => {}
        }
    }

    let globals = global_closure(roots, symbols)
        .into_iter()
        .map(|g| g.qualified_name())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Dependencies {
        targets: targets.into_iter().collect(),
        globals,
    }
}

/// Fixed-point closure of `roots` over global-to-global references.
///
/// Global bodies resolve against globals only; they cannot pull in targets.
/// Mutually recursive helpers terminate because each object is visited once.
pub fn global_closure<'a>(
    roots: Vec<&'a GlobalObject>,
    symbols: &'a SymbolTable,
) -> Vec<&'a GlobalObject> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    let mut queue: VecDeque<&GlobalObject> = roots.into_iter().collect();

    while let Some(global) = queue.pop_front() {
        if !visited.insert(global.qualified_name()) {
            continue;
        }
        out.push(global);

        if global.kind == GlobalKind::Value {
            continue;
        }

        for word in scan::identifiers(&global.body) {
            if word == global.name {
                continue;
            }
            if let Some(next) = symbols.resolve_global(&word) {
                queue.push_back(next);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        let mut t = SymbolTable::new(&["helpers".to_string()]);
        t.add_target("raw");
        t.add_target("model");
        t.add_global(GlobalObject::function("main", "clean", "trim | dedupe"));
        t.add_global(GlobalObject::function("helpers", "trim", "sed 's/ //g'"));
        t.add_global(GlobalObject::function("helpers", "dedupe", "sort -u | trim"));
        t.add_global(GlobalObject::value("main", "unused", "1"));
        t.add_global(GlobalObject::function("other", "hidden", "echo"));
        t
    }

    #[test]
    fn restricts_to_symbol_table() {
        let deps = analyze_command("cat \"$raw\" | clean | hidden | wc -l", &table(), None);
        assert_eq!(deps.targets, vec!["raw"]);
        assert!(!deps.globals.iter().any(|g| g.contains("hidden")));
    }

    #[test]
    fn closes_over_nested_globals() {
        let deps = analyze_command("echo \"$raw\" | clean", &table(), None);
        assert_eq!(
            deps.globals,
            vec!["helpers::dedupe", "helpers::trim", "main::clean"]
        );
    }

    #[test]
    fn drops_self_reference() {
        let deps = analyze_command("echo $model $raw", &table(), Some("model"));
        assert_eq!(deps.targets, vec!["raw"]);
    }

    #[test]
    fn raw_query_keeps_appearance_order_without_closure() {
        let found = referenced_symbols("clean $model $raw unknown", &table());
        assert_eq!(found, vec!["clean", "model", "raw"]);
    }

    #[test]
    fn expansions_next_to_paths_and_quotes_count() {
        let t = table();
        for source in [
            "echo $raw-suffix",
            "cat $raw/plot.csv",
            "cp x $raw.bak",
            "echo \"it's\" \"$raw\"",
            "echo \" # total: $raw\"",
        ] {
            let deps = analyze_command(source, &t, None);
            assert_eq!(deps.targets, vec!["raw"], "{source}");
        }
    }

    #[test]
    fn mutual_recursion_terminates() {
        let mut t = SymbolTable::new(&[]);
        t.add_global(GlobalObject::function("main", "ping", "pong"));
        t.add_global(GlobalObject::function("main", "pong", "ping"));
        let deps = analyze_command("ping", &t, None);
        assert_eq!(deps.globals, vec!["main::ping", "main::pong"]);
    }
}
