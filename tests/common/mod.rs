#![allow(dead_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub use targetdag_test_utils::builders;
pub use targetdag_test_utils::fake_executor::{echo_behaviour, failing_behaviour};
pub use targetdag_test_utils::{init_tracing, run_fake};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Write `contents` as `Targetdag.toml` inside `dir` and return its path.
pub fn write_workflow(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("Targetdag.toml");
    fs::write(&path, contents).unwrap();
    path
}
