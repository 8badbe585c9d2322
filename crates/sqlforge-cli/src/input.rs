//! File reading for the driver: the config file itself, then the schema and
//! query files it points at (spec.md §6.1).

use anyhow::{Context, Result};
use std::path::Path;

/// Reads `path` to a string, wrapping any I/O error with the path for
/// context (ground: `flowscope-cli::input::read_from_files`'s
/// `with_context` idiom).
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}
