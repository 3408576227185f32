//! Centralized file names and path-building functions. No other module
//! should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "rsc.json";
pub const OUTPUT_EXTENSION: &str = "bin";

// ── Directory names ──────────────────────────────────────────────

pub const OUTPUT_DIR: &str = "out";

// ── Functions ────────────────────────────────────────────────────

pub fn settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(SETTINGS_FILE)
}

pub fn default_output_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(OUTPUT_DIR)
}

/// File name of a compiled script, `[proc,foo]` becoming `proc_foo.bin`.
pub fn script_output_name(trigger: &str, name: &str) -> String {
    format!("{trigger}_{name}.{OUTPUT_EXTENSION}")
}

/// File name of a compiled config, grouped by its file extension.
pub fn config_output_name(extension: &str, name: &str) -> String {
    format!("{extension}_{name}.{OUTPUT_EXTENSION}")
}
