//! Resource definition loading
//!
//! Definitions are YAML documents separated by `---`. The `kind` field
//! selects the concrete resource type; `apiVersion`, when present, must be
//! [`API_VERSION`].

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::resource::{
    BoxedResource, ContainerImage, DeploymentManagerAutogenTemplate, DeploymentManagerTemplate,
    Resource,
};
use crate::types::{API_VERSION, TypeMeta};

/// Kinds this build can load
pub const KINDS: &[&str] = &[
    DeploymentManagerAutogenTemplate::KIND,
    DeploymentManagerTemplate::KIND,
    ContainerImage::KIND,
];

/// Parse every resource defined in `content`
///
/// Empty documents are skipped.
pub fn parse_documents(content: &str) -> Result<Vec<BoxedResource>> {
    let mut resources = Vec::new();

    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        resources.push(decode(value)?);
    }

    Ok(resources)
}

/// Decode one definition, dispatching on its `kind`
pub fn decode(value: Value) -> Result<BoxedResource> {
    let header: TypeMeta = serde_yaml::from_value(value.clone())?;

    let resource: BoxedResource = match header.kind.as_str() {
        DeploymentManagerAutogenTemplate::KIND => {
            Box::new(typed::<DeploymentManagerAutogenTemplate>(value)?)
        }
        DeploymentManagerTemplate::KIND => Box::new(typed::<DeploymentManagerTemplate>(value)?),
        ContainerImage::KIND => Box::new(typed::<ContainerImage>(value)?),
        other => {
            return Err(Error::UnknownKind {
                kind: other.to_string(),
            });
        }
    };

    if resource.name().is_empty() {
        return Err(Error::MissingName { kind: header.kind });
    }
    if !header.api_version.is_empty() && header.api_version != API_VERSION {
        return Err(Error::UnsupportedApiVersion {
            name: resource.name().to_string(),
            api_version: header.api_version,
        });
    }

    Ok(resource)
}

fn typed<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_yaml::from_value(value)?)
}

/// Parse a definitions file
pub fn load_file(path: &Path) -> Result<Vec<BoxedResource>> {
    let content = fs::read_to_string(path).map_err(Error::io(path))?;
    parse_documents(&content)
}

/// Load a definitions file and register its resources
///
/// Resources are registered with the file's directory as their source
/// directory, in document order. Returns how many were registered.
pub fn register_file(registry: &mut Registry<'_>, path: &Path) -> Result<usize> {
    let resources = load_file(path)?;
    let source_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let count = resources.len();
    for resource in resources {
        registry.register(resource, source_dir);
    }
    log::debug!("Loaded {count} resources from {}", path.display());
    Ok(count)
}
