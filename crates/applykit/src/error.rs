//! Error types for resource registration, resolution and apply

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while resolving or applying resources
#[derive(Debug, Error)]
pub enum Error {
    /// A required reference field has no name set
    #[error("missing reference to a {kind} resource")]
    MissingReference {
        /// Kind the reference was expected to point at
        kind: String,
    },

    /// The referenced name is not registered
    #[error("referenced {kind} \"{name}\" is not registered")]
    ReferenceNotFound { name: String, kind: String },

    /// No resource is registered under the name asked for
    #[error("no resource named \"{name}\" is registered")]
    UnknownResource { name: String },

    /// A field the resource needs to apply is empty
    #[error("{kind} \"{name}\" has no {field}")]
    MissingField {
        kind: String,
        name: String,
        field: &'static str,
    },

    /// The referenced name is registered under a different kind
    #[error("reference \"{name}\" expects kind {expected}, found {actual}")]
    ReferenceKindMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// A producer was resolved before it published its output directory
    #[error("resource \"{name}\" has no output directory (has it been applied?)")]
    OutputNotReady { name: String },

    /// An external command exited unsuccessfully
    #[error("command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// An external command could not be started
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Local filesystem operation failed
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Resource definition or autogen spec could not be (de)serialized
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Resource definition names a kind nobody implements
    #[error("unknown resource kind: {kind}")]
    UnknownKind { kind: String },

    /// Resource definition uses an API version this build does not speak
    #[error("resource \"{name}\" uses unsupported apiVersion {api_version}")]
    UnsupportedApiVersion { name: String, api_version: String },

    /// Resource definition has no `metadata.name`
    #[error("{kind} resource is missing metadata.name")]
    MissingName { kind: String },

    /// Failure while applying a registered resource
    #[error("failed to apply {kind} \"{resource}\": {source}")]
    Apply {
        resource: String,
        kind: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a closure mapping an `io::Error` at `path` into [`Error::Io`]
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }

    /// The innermost error, looking through [`Error::Apply`] wrappers
    pub fn root(&self) -> &Self {
        match self {
            Self::Apply { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if the error comes from reference resolution
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self.root(),
            Self::MissingReference { .. }
                | Self::ReferenceNotFound { .. }
                | Self::ReferenceKindMismatch { .. }
                | Self::UnknownResource { .. }
        )
    }

    /// Returns true if an external command was involved
    pub fn is_command_error(&self) -> bool {
        matches!(self.root(), Self::CommandFailed { .. } | Self::Spawn { .. })
    }
}

/// Result type for applykit operations
pub type Result<T> = std::result::Result<T, Error>;
