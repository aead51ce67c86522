pub mod apply;
pub mod check;

use anyhow::{Context as AnyhowContext, Result};
use applykit::{Registry, register_file};
use std::path::PathBuf;

use crate::paths;

/// Register every resource in `files`, in order
///
/// A name defined again in a later file replaces the earlier definition.
pub fn load_definitions(registry: &mut Registry<'_>, files: &[PathBuf]) -> Result<usize> {
    let mut total = 0;
    for file in files {
        let path = paths::expand(&file.to_string_lossy());
        total += register_file(registry, &path)
            .with_context(|| format!("Failed to load definitions from {}", path.display()))?;
    }
    Ok(total)
}
