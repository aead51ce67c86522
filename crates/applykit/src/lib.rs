//! # applykit
//!
//! A registry of named, typed resources that reference each other by name
//! and apply through external tools.
//!
//! ## Core Concepts
//!
//! - **Resource**: A named unit of configuration with an apply-time side effect
//! - **Reference**: A lookup key (name + expected kind) pointing at another resource
//! - **Registry**: Owns resources and their source directories, resolves references,
//!   applies in registration order
//! - **CommandExecutor**: The only way resources touch the outside world
//!
//! ## Example
//!
//! ```no_run
//! use applykit::{
//!     DeploymentManagerAutogenTemplate, DeploymentManagerTemplate, Registry, Resource,
//!     SystemExecutor,
//! };
//!
//! let spec = serde_yaml::from_str("spec: {}").unwrap();
//! let autogen = DeploymentManagerAutogenTemplate::new("autogen", spec);
//! let template = DeploymentManagerTemplate::new(
//!     "dm-template",
//!     autogen.reference(),
//!     "gs://my-bucket/template.zip",
//! );
//!
//! let executor = SystemExecutor;
//! let mut registry = Registry::new(&executor);
//! registry.register(Box::new(autogen), "deploy");
//! registry.register(Box::new(template), "deploy");
//!
//! // Producer first, then the template that packages its output
//! registry.apply()?;
//! # Ok::<(), applykit::Error>(())
//! ```
//!
//! ## Testing
//!
//! [`RecordingExecutor`] records every [`Invocation`] instead of running it,
//! so the exact commands an apply issues can be asserted on.

pub mod error;
pub mod executor;
pub mod loader;
pub mod registry;
pub mod resource;
pub mod settings;
pub mod types;

// Re-export main types at crate root
pub use error::{Error, Result};
pub use executor::{CommandExecutor, RecordingExecutor, SystemExecutor};
pub use loader::{parse_documents, register_file};
pub use registry::Registry;
pub use resource::{
    BoxedResource, ContainerImage, DeploymentManagerAutogenTemplate, DeploymentManagerTemplate,
    Destination, Resource,
};
pub use settings::{AutogenSettings, Settings, Tools};
pub use types::{
    API_VERSION, CommandOutput, Invocation, Metadata, Reference, ReferenceField, TypeMeta,
};
