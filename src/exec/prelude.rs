// src/exec/prelude.rs

//! Shell prelude defining every global before a target's command runs.

use crate::analysis::{GlobalKind, SymbolTable};

/// Quote `s` as a single-quoted POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Render the prelude for `symbols`.
///
/// Definitions are emitted lowest precedence first, so when two namespaces
/// define the same name the later (winning) definition overrides the earlier
/// one. Globals shadowed by a target of the same name are left out: the
/// target's value arrives through the environment.
pub fn build_prelude(symbols: &SymbolTable) -> String {
    let mut out = String::new();

    for global in symbols.globals_by_ascending_precedence() {
        if symbols.is_target(&global.name) {
            continue;
        }
        match global.kind {
            GlobalKind::Value => {
                out.push_str(&format!(
                    "{}={}\nexport {}\n",
                    global.name,
                    shell_quote(&global.body),
                    global.name
                ));
            }
            GlobalKind::Function => {
                out.push_str(&format!("{}() {{\n{}\n}}\n", global.name, global.body));
            }
        }
    }

    out
}
