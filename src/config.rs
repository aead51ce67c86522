//! Settings file loading
//!
//! ```toml
//! [tools]
//! docker = "podman"
//! zip = "zip"
//! gsutil = "gsutil"
//!
//! [autogen]
//! image = "gcr.io/cloud-marketplace-tools/dm/autogen"
//! ```
//!
//! Every key is optional; a missing default file means default settings.

use anyhow::{Context, Result, bail};
use applykit::Settings;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.toml";

/// Load settings from `explicit`, or from the config directory
///
/// An explicitly named file must exist.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(path) => paths::expand(&path.to_string_lossy()),
        None => paths::config_dir()?.join(SETTINGS_FILE),
    };

    if !path.exists() {
        if explicit.is_some() {
            bail!("Settings file not found: {}", path.display());
        }
        log::debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    read(&path)
}

fn read(path: &PathBuf) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))
}

/// Parse settings TOML
pub fn parse(content: &str) -> Result<Settings> {
    toml::from_str(content).context("Invalid settings format")
}
