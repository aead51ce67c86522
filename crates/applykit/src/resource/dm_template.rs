//! Deployment Manager template - packages an autogen output as a zip

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::autogen::DeploymentManagerAutogenTemplate;
use super::{Resource, ensure_parent, remove_stale, resolve_definition_path};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::{Invocation, Metadata, Reference, ReferenceField, TypeMeta};

/// Archive name used when the zip is only staged locally before upload
pub const STAGED_ARCHIVE: &str = "dm_template.zip";

/// URI prefixes treated as object-storage upload targets
pub const REMOTE_SCHEMES: &[&str] = &["gs://"];

/// Where a packaged template ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Object-storage URI; the archive is uploaded there
    Remote(String),
    /// Filesystem path; absolute or relative to the definition's directory
    Local(PathBuf),
}

impl Destination {
    pub fn parse(path: &str) -> Self {
        if REMOTE_SCHEMES.iter().any(|scheme| path.starts_with(scheme)) {
            Self::Remote(path.to_string())
        } else {
            Self::Local(PathBuf::from(path))
        }
    }
}

/// Zips the output of an autogen template to a local path or bucket
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManagerTemplate {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: Metadata,
    /// Autogen template whose output is packaged
    #[serde(default)]
    pub deployment_manager_ref: Reference,
    /// `gs://` URI or filesystem path of the resulting zip
    #[serde(default)]
    pub zip_file_path: String,
}

impl DeploymentManagerTemplate {
    pub const KIND: &'static str = "DeploymentManagerTemplate";

    pub fn new(
        name: impl Into<String>,
        deployment_manager_ref: Reference,
        zip_file_path: impl Into<String>,
    ) -> Self {
        Self {
            type_meta: TypeMeta::new(Self::KIND),
            metadata: Metadata::named(name),
            deployment_manager_ref,
            zip_file_path: zip_file_path.into(),
        }
    }

    fn zip_invocation(registry: &Registry<'_>, source_dir: &Path, archive: &Path) -> Invocation {
        Invocation::new(&registry.settings().tools.zip)
            .arg("-r")
            .arg(archive.to_string_lossy())
            .arg(".")
            .current_dir(source_dir)
    }

    fn upload_invocation(registry: &Registry<'_>, archive: &Path, uri: &str) -> Invocation {
        Invocation::new(&registry.settings().tools.gsutil)
            .arg("cp")
            .arg(archive.to_string_lossy())
            .arg(uri)
    }
}

impl Resource for DeploymentManagerTemplate {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn description(&self) -> String {
        format!(
            "Package {} into {}",
            self.deployment_manager_ref.name, self.zip_file_path
        )
    }

    fn references(&self) -> Vec<ReferenceField<'_>> {
        vec![ReferenceField {
            field: "deploymentManagerRef",
            reference: &self.deployment_manager_ref,
            kind: DeploymentManagerAutogenTemplate::KIND,
            required: true,
        }]
    }

    fn apply(&self, registry: &Registry<'_>) -> Result<()> {
        let producer = registry.resolve_as(
            &self.deployment_manager_ref,
            DeploymentManagerAutogenTemplate::KIND,
        )?;
        let package_dir = producer.output_dir().ok_or_else(|| Error::OutputNotReady {
            name: producer.name().to_string(),
        })?;
        if self.zip_file_path.trim().is_empty() {
            return Err(Error::MissingField {
                kind: self.kind().to_string(),
                name: self.name().to_string(),
                field: "zipFilePath",
            });
        }
        let executor = registry.executor();

        match Destination::parse(&self.zip_file_path) {
            Destination::Remote(uri) => {
                let archive = package_dir.join(STAGED_ARCHIVE);
                remove_stale(&archive)?;

                log::info!("Packaging {} for upload to {uri}", package_dir.display());
                executor.run_checked(&Self::zip_invocation(registry, &package_dir, &archive))?;
                executor.run_checked(&Self::upload_invocation(registry, &archive, &uri))?;

                // Staged copy is transient once uploaded
                remove_stale(&archive)
            }
            Destination::Local(path) => {
                let archive = resolve_definition_path(registry, self.name(), &path)?;
                ensure_parent(&archive)?;
                remove_stale(&archive)?;

                log::info!(
                    "Packaging {} into {}",
                    package_dir.display(),
                    archive.display()
                );
                executor.run_checked(&Self::zip_invocation(registry, &package_dir, &archive))?;
                Ok(())
            }
        }
    }
}
