//! Container image - docker build (and optional push)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::autogen::DeploymentManagerAutogenTemplate;
use super::{Resource, resolve_definition_path};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::{Invocation, Metadata, Reference, ReferenceField, TypeMeta};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImage {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: Metadata,
    /// Tag to build, e.g. `gcr.io/project/app:1.0`
    pub image: String,
    /// Build context, relative to the definition's directory
    #[serde(default = "default_context")]
    pub context: String,
    /// Producer whose output directory replaces `context`
    #[serde(default)]
    pub context_ref: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    #[serde(default)]
    pub push: bool,
}

fn default_context() -> String {
    ".".to_string()
}

impl ContainerImage {
    pub const KIND: &'static str = "ContainerImage";

    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::new(Self::KIND),
            metadata: Metadata::named(name),
            image: image.into(),
            context: default_context(),
            ..Default::default()
        }
    }

    fn build_context(&self, registry: &Registry<'_>) -> Result<PathBuf> {
        if self.context_ref.is_empty() {
            return resolve_definition_path(registry, self.name(), Path::new(&self.context));
        }

        let producer =
            registry.resolve_as(&self.context_ref, DeploymentManagerAutogenTemplate::KIND)?;
        producer.output_dir().ok_or_else(|| Error::OutputNotReady {
            name: producer.name().to_string(),
        })
    }

    fn build_invocation(&self, registry: &Registry<'_>, context: &Path) -> Result<Invocation> {
        let mut invocation = Invocation::new(&registry.settings().tools.docker)
            .args(["build", "-t", self.image.as_str()]);

        if let Some(dockerfile) = &self.dockerfile {
            let dockerfile = resolve_definition_path(registry, self.name(), Path::new(dockerfile))?;
            invocation = invocation.arg("-f").arg(dockerfile.to_string_lossy());
        }
        for (key, value) in &self.build_args {
            invocation = invocation.arg("--build-arg").arg(format!("{key}={value}"));
        }

        Ok(invocation.arg(context.to_string_lossy()))
    }
}

impl Resource for ContainerImage {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn description(&self) -> String {
        if self.push {
            format!("Build and push {}", self.image)
        } else {
            format!("Build {}", self.image)
        }
    }

    fn references(&self) -> Vec<ReferenceField<'_>> {
        if self.context_ref.is_empty() {
            return Vec::new();
        }
        vec![ReferenceField {
            field: "contextRef",
            reference: &self.context_ref,
            kind: DeploymentManagerAutogenTemplate::KIND,
            required: false,
        }]
    }

    fn apply(&self, registry: &Registry<'_>) -> Result<()> {
        let context = self.build_context(registry)?;
        let executor = registry.executor();

        log::info!("Building {} from {}", self.image, context.display());
        executor.run_checked(&self.build_invocation(registry, &context)?)?;

        if self.push {
            log::info!("Pushing {}", self.image);
            let push = Invocation::new(&registry.settings().tools.docker)
                .arg("push")
                .arg(&self.image);
            executor.run_checked(&push)?;
        }

        Ok(())
    }
}
