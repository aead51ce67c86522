//! Core types shared by resources, the registry and executors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;

/// API version understood by this build
pub const API_VERSION: &str = "dev.marketplace.cloud.google.com/v1alpha1";

/// `apiVersion` and `kind` header of a resource definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
}

impl TypeMeta {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.into(),
        }
    }
}

/// `metadata` block of a resource definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Lookup key pointing at another resource by name
///
/// This is not an ownership pointer; it is resolved against a
/// [`Registry`](crate::Registry) at apply time. The default value (empty
/// name) means no reference is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub name: String,
    /// Kind the referenced resource must have. May be left empty in
    /// definitions; the referencing field supplies its own expectation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl Reference {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Check if no reference is configured
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.kind, self.name)
        }
    }
}

/// A reference field declared by a resource, with the kind that field accepts
#[derive(Debug, Clone, Copy)]
pub struct ReferenceField<'a> {
    /// Field name as written in definitions (e.g. `deploymentManagerRef`)
    pub field: &'static str,
    pub reference: &'a Reference,
    /// Kind the referenced resource must have
    pub kind: &'static str,
    /// Whether an empty reference is an error
    pub required: bool,
}

/// A single external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits the caller's
    pub dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output from an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Successful output with nothing printed
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Failed output carrying `stderr`
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into().into_bytes(),
            ..Default::default()
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
