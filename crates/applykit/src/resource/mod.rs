//! Resource trait and the built-in resource kinds
//!
//! A resource is a named, typed unit of declarative configuration with an
//! apply-time side effect. Resources point at each other through
//! [`Reference`]s, which the [`Registry`] resolves when they apply.

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::{Metadata, Reference, ReferenceField, TypeMeta};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub mod autogen;
pub mod container_image;
pub mod dm_template;

pub use autogen::DeploymentManagerAutogenTemplate;
pub use container_image::ContainerImage;
pub use dm_template::{DeploymentManagerTemplate, Destination};

/// Core trait for all resource kinds
///
/// Adding a kind means implementing this trait (and teaching the loader its
/// `kind` string); the registry never changes.
pub trait Resource: Send + Sync + fmt::Debug {
    fn type_meta(&self) -> &TypeMeta;

    fn metadata(&self) -> &Metadata;

    /// Unique name within a registry
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Kind tag (e.g. "DeploymentManagerTemplate")
    fn kind(&self) -> &str {
        &self.type_meta().kind
    }

    /// A reference pointing at this resource
    fn reference(&self) -> Reference {
        Reference::new(self.name(), self.kind())
    }

    /// Human-readable description
    fn description(&self) -> String;

    /// Reference fields this resource declares
    ///
    /// Required fields are listed even when empty; optional ones may be.
    fn references(&self) -> Vec<ReferenceField<'_>> {
        Vec::new()
    }

    /// Directory populated by a successful apply, for dependents to consume
    ///
    /// `None` for kinds that produce nothing and for producers that have
    /// not been applied yet.
    fn output_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Perform the side effect, resolving references through `registry`
    ///
    /// Errors come back as-is. [`Registry::apply`] and
    /// [`Registry::apply_one`] wrap them in [`Error::Apply`] with this
    /// resource's name and kind; prefer those entry points.
    fn apply(&self, registry: &Registry<'_>) -> Result<()>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// Resolve `path` the way definitions expect: absolute paths as-is, relative
/// ones against the directory `owner` was registered from.
pub(crate) fn resolve_definition_path(
    registry: &Registry<'_>,
    owner: &str,
    path: &Path,
) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let joined = match registry.source_dir(owner) {
        Some(dir) => dir.join(path),
        None => {
            log::debug!("{owner} is not registered; resolving {} against cwd", path.display());
            path.to_path_buf()
        }
    };

    std::path::absolute(&joined).map_err(Error::io(&joined))
}

/// Remove a file left over from an earlier run, if any
pub(crate) fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path)(e)),
    }
}

/// Create the parent directory of `path` if it is missing
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(Error::io(parent))?;
    }
    Ok(())
}
