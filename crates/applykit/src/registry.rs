//! Registry - binds named resources and drives apply order
//!
//! The registry owns every registered resource together with the directory
//! its definition came from. It resolves [`Reference`]s by name, checking
//! the kind of whatever it finds, and applies resources strictly in
//! registration order, stopping at the first failure.
//!
//! There is no process-wide registry: each apply run builds its own and
//! passes it to resources explicitly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::resource::{BoxedResource, Resource};
use crate::settings::Settings;
use crate::types::Reference;

struct Entry {
    resource: BoxedResource,
    source_dir: PathBuf,
}

/// Name → resource bindings plus the executor resources apply through
pub struct Registry<'a> {
    executor: &'a dyn CommandExecutor,
    settings: Settings,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl<'a> Registry<'a> {
    /// Create an empty registry with default settings
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self::with_settings(executor, Settings::default())
    }

    pub fn with_settings(executor: &'a dyn CommandExecutor, settings: Settings) -> Self {
        Self {
            executor,
            settings,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a resource loaded from `source_dir`
    ///
    /// Registering a name twice overwrites the earlier resource and
    /// directory. The entry keeps its original position in apply order.
    pub fn register(&mut self, resource: BoxedResource, source_dir: impl Into<PathBuf>) {
        let entry = Entry {
            resource,
            source_dir: source_dir.into(),
        };
        let name = entry.resource.name().to_string();

        if let Some(&slot) = self.index.get(&name) {
            log::warn!(
                "Resource \"{name}\" registered twice; {} replaces {}",
                entry.resource.kind(),
                self.entries[slot].resource.kind()
            );
            self.entries[slot] = entry;
        } else {
            log::debug!(
                "Registered {} \"{name}\" from {}",
                entry.resource.kind(),
                entry.source_dir.display()
            );
            self.index.insert(name, self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Look up the resource a reference points at
    ///
    /// Fails with [`Error::MissingReference`] for an empty reference,
    /// [`Error::ReferenceNotFound`] when nothing is registered under the name
    /// and [`Error::ReferenceKindMismatch`] when the registered resource has
    /// another kind. A reference with an empty kind accepts any kind.
    pub fn resolve(&self, reference: &Reference) -> Result<&dyn Resource> {
        if reference.is_empty() {
            return Err(Error::MissingReference {
                kind: reference.kind.clone(),
            });
        }

        let resource = self
            .get(&reference.name)
            .ok_or_else(|| Error::ReferenceNotFound {
                name: reference.name.clone(),
                kind: reference.kind.clone(),
            })?;

        if !reference.kind.is_empty() && resource.kind() != reference.kind {
            return Err(Error::ReferenceKindMismatch {
                name: reference.name.clone(),
                expected: reference.kind.clone(),
                actual: resource.kind().to_string(),
            });
        }

        Ok(resource)
    }

    /// Resolve a reference held by a field that only accepts `kind`
    ///
    /// The name is looked up first. After that, the reference's own kind
    /// (when written) and the registered resource's kind must both agree
    /// with `kind`.
    pub fn resolve_as(&self, reference: &Reference, kind: &str) -> Result<&dyn Resource> {
        if reference.is_empty() {
            return Err(Error::MissingReference {
                kind: kind.to_string(),
            });
        }

        let resource = self
            .get(&reference.name)
            .ok_or_else(|| Error::ReferenceNotFound {
                name: reference.name.clone(),
                kind: kind.to_string(),
            })?;

        let actual = if reference.kind.is_empty() || reference.kind == kind {
            resource.kind()
        } else {
            reference.kind.as_str()
        };
        if actual != kind {
            return Err(Error::ReferenceKindMismatch {
                name: reference.name.clone(),
                expected: kind.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(resource)
    }

    /// Apply every registered resource in registration order
    ///
    /// Stops at the first failure; later resources are not applied.
    pub fn apply(&self) -> Result<()> {
        for entry in &self.entries {
            self.apply_entry(entry)?;
        }
        Ok(())
    }

    /// Apply a single registered resource
    pub fn apply_one(&self, name: &str) -> Result<()> {
        let entry = self
            .index
            .get(name)
            .map(|&slot| &self.entries[slot])
            .ok_or_else(|| Error::UnknownResource {
                name: name.to_string(),
            })?;
        self.apply_entry(entry)
    }

    fn apply_entry(&self, entry: &Entry) -> Result<()> {
        let resource = entry.resource.as_ref();
        log::info!("Applying {} \"{}\"", resource.kind(), resource.name());

        resource.apply(self).map_err(|source| Error::Apply {
            resource: resource.name().to_string(),
            kind: resource.kind().to_string(),
            source: Box::new(source),
        })
    }

    /// Resolve every declared reference without applying anything
    ///
    /// Optional references that are unset are skipped.
    pub fn check_references(&self) -> Result<()> {
        for entry in &self.entries {
            let resource = entry.resource.as_ref();
            for field in resource.references() {
                if field.reference.is_empty() && !field.required {
                    continue;
                }
                self.resolve_as(field.reference, field.kind)
                    .map_err(|source| Error::Apply {
                        resource: resource.name().to_string(),
                        kind: resource.kind().to_string(),
                        source: Box::new(source),
                    })?;
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Resource> {
        self.index
            .get(name)
            .map(|&slot| self.entries[slot].resource.as_ref())
    }

    /// Directory the named resource was registered from
    pub fn source_dir(&self, name: &str) -> Option<&Path> {
        self.index
            .get(name)
            .map(|&slot| self.entries[slot].source_dir.as_path())
    }

    /// Registered resources with their source directories, in apply order
    pub fn iter(&self) -> impl Iterator<Item = (&dyn Resource, &Path)> {
        self.entries
            .iter()
            .map(|e| (e.resource.as_ref(), e.source_dir.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl std::fmt::Debug for Registry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.index.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use crate::resource::{ContainerImage, DeploymentManagerAutogenTemplate, DeploymentManagerTemplate};
    use crate::types::{Metadata, TypeMeta};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Resource that counts applies and optionally fails
    #[derive(Debug)]
    struct Probe {
        type_meta: TypeMeta,
        metadata: Metadata,
        applied: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Probe {
        fn new(name: &str, applied: &Arc<AtomicUsize>) -> Self {
            Self {
                type_meta: TypeMeta::new("Probe"),
                metadata: Metadata::named(name),
                applied: Arc::clone(applied),
                fail: false,
            }
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl Resource for Probe {
        fn type_meta(&self) -> &TypeMeta {
            &self.type_meta
        }

        fn metadata(&self) -> &Metadata {
            &self.metadata
        }

        fn description(&self) -> String {
            format!("Probe {}", self.metadata.name)
        }

        fn apply(&self, registry: &Registry<'_>) -> Result<()> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            let invocation = crate::types::Invocation::new("probe").arg(self.name());
            if self.fail {
                return Err(Error::CommandFailed {
                    command: invocation.to_string(),
                    stderr: "probe failure".into(),
                });
            }
            registry.executor().run_checked(&invocation)?;
            Ok(())
        }
    }

    fn autogen(name: &str) -> BoxedResource {
        Box::new(
            DeploymentManagerAutogenTemplate::new(name, serde_yaml::Value::Null)
                .with_output_dir("/tmp/outdir"),
        )
    }

    #[test]
    fn test_resolve_found() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "dir");

        let found = registry
            .resolve(&Reference::new("autogen", DeploymentManagerAutogenTemplate::KIND))
            .unwrap();
        assert_eq!(found.name(), "autogen");

        // empty kind accepts anything
        assert!(registry.resolve(&Reference::new("autogen", "")).is_ok());
    }

    #[test]
    fn test_resolve_errors() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "dir");

        let err = registry.resolve(&Reference::default()).unwrap_err();
        assert!(matches!(err, Error::MissingReference { .. }));

        let err = registry
            .resolve(&Reference::new("absent", DeploymentManagerAutogenTemplate::KIND))
            .unwrap_err();
        assert!(matches!(err, Error::ReferenceNotFound { ref name, .. } if name == "absent"));

        let err = registry
            .resolve(&Reference::new("autogen", ContainerImage::KIND))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ReferenceKindMismatch { ref expected, ref actual, .. }
                if expected == ContainerImage::KIND
                    && actual == DeploymentManagerAutogenTemplate::KIND
        ));
    }

    #[test]
    fn test_resolve_as_rejects_conflicting_declared_kind() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "dir");

        let declared = Reference::new("autogen", ContainerImage::KIND);
        let err = registry
            .resolve_as(&declared, DeploymentManagerAutogenTemplate::KIND)
            .unwrap_err();
        assert!(matches!(err, Error::ReferenceKindMismatch { .. }));

        let undeclared = Reference::new("autogen", "");
        assert!(
            registry
                .resolve_as(&undeclared, DeploymentManagerAutogenTemplate::KIND)
                .is_ok()
        );
    }

    #[test]
    fn test_resolve_as_reports_absent_name_before_kind() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "dir");

        let absent = Reference::new("absent", ContainerImage::KIND);
        let err = registry
            .resolve_as(&absent, DeploymentManagerAutogenTemplate::KIND)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ReferenceNotFound { ref name, ref kind }
                if name == "absent" && kind == DeploymentManagerAutogenTemplate::KIND
        ));

        let err = registry
            .resolve_as(&Reference::default(), DeploymentManagerAutogenTemplate::KIND)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingReference { ref kind } if kind == DeploymentManagerAutogenTemplate::KIND
        ));
    }

    #[test]
    fn test_apply_in_registration_order() {
        let exec = RecordingExecutor::new();
        let applied = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new(&exec);
        for name in ["c", "a", "b"] {
            registry.register(Box::new(Probe::new(name, &applied)), "dir");
        }

        registry.apply().unwrap();

        assert_eq!(applied.load(Ordering::SeqCst), 3);
        assert_eq!(
            exec.argvs(),
            vec![vec!["probe", "c"], vec!["probe", "a"], vec!["probe", "b"]]
        );
    }

    #[test]
    fn test_apply_stops_at_first_failure() {
        let exec = RecordingExecutor::new();
        let applied = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new(&exec);
        registry.register(Box::new(Probe::new("first", &applied)), "dir");
        registry.register(Box::new(Probe::new("broken", &applied).failing()), "dir");
        registry.register(Box::new(Probe::new("never", &applied)), "dir");

        let err = registry.apply().unwrap_err();

        assert!(matches!(&err, Error::Apply { resource, kind, .. } if resource == "broken" && kind == "Probe"));
        assert_eq!(applied.load(Ordering::SeqCst), 2);
        assert_eq!(exec.argvs(), vec![vec!["probe", "first"]]);
    }

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let exec = RecordingExecutor::new();
        let applied = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new(&exec);
        registry.register(Box::new(Probe::new("x", &applied)), "first-dir");
        registry.register(Box::new(Probe::new("y", &applied)), "dir");
        registry.register(autogen("x"), "second-dir");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("x").unwrap().kind(), DeploymentManagerAutogenTemplate::KIND);
        assert_eq!(registry.source_dir("x"), Some(Path::new("second-dir")));

        let order: Vec<_> = registry.iter().map(|(r, _)| r.name().to_string()).collect();
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn test_apply_one_only_touches_named_resource() {
        let exec = RecordingExecutor::new();
        let applied = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new(&exec);
        registry.register(Box::new(Probe::new("a", &applied)), "dir");
        registry.register(Box::new(Probe::new("b", &applied)), "dir");

        registry.apply_one("b").unwrap();
        assert_eq!(exec.argvs(), vec![vec!["probe", "b"]]);

        let err = registry.apply_one("zzz").unwrap_err();
        assert!(matches!(err, Error::UnknownResource { .. }));
        assert_eq!(err.to_string(), "no resource named \"zzz\" is registered");
    }

    #[test]
    fn test_resource_without_references_never_resolves() {
        // Nothing else is registered, so any resolution would fail
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(Box::new(ContainerImage::new("app", "gcr.io/p/app:1")), "/srv");

        registry.apply().unwrap();
        registry.check_references().unwrap();
        assert_eq!(exec.call_count(), 1);
    }

    #[test]
    fn test_dependent_scenario_two_calls() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "resourcedir");
        registry.register(
            Box::new(DeploymentManagerTemplate::new(
                "dm",
                Reference::new("autogen", DeploymentManagerAutogenTemplate::KIND),
                "gs://project/dmtemppath.zip",
            )),
            "resourcedir",
        );

        registry.apply_one("dm").unwrap();

        assert_eq!(
            exec.argvs(),
            vec![
                vec!["zip", "-r", "/tmp/outdir/dm_template.zip", "."],
                vec![
                    "gsutil",
                    "cp",
                    "/tmp/outdir/dm_template.zip",
                    "gs://project/dmtemppath.zip"
                ],
            ]
        );
    }

    #[test]
    fn test_whole_registry_apply_is_repeatable() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "resourcedir");
        registry.register(
            Box::new(DeploymentManagerTemplate::new(
                "dm",
                Reference::new("autogen", ""),
                "gs://project/dmtemppath.zip",
            )),
            "resourcedir",
        );

        registry.apply().unwrap();
        let first = exec.calls();
        exec.clear();
        registry.apply().unwrap();
        let second = exec.calls();

        let shape = |calls: &[crate::types::Invocation]| {
            calls
                .iter()
                .map(|c| (c.program.clone(), c.args.len(), c.args.first().cloned()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));
        assert_eq!(first.len(), 3);

        // docker run output mount is fresh each time; the dm template consumes it
        for calls in [&first, &second] {
            let out = calls[0].args[4].trim_start_matches("type=bind,src=");
            let out = out.trim_end_matches(",dst=/tmp/out");
            assert_eq!(calls[1].dir.as_deref(), Some(Path::new(out)));
            std::fs::remove_dir_all(out).unwrap();
        }
    }

    #[test]
    fn test_check_references_reports_offender() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(autogen("autogen"), "dir");
        registry.register(
            Box::new(DeploymentManagerTemplate::new("dm", Reference::default(), "out.zip")),
            "dir",
        );

        let err = registry.check_references().unwrap_err();
        assert!(matches!(&err, Error::Apply { resource, .. } if resource == "dm"));
        assert!(matches!(err.root(), Error::MissingReference { kind } if kind == DeploymentManagerAutogenTemplate::KIND));
        assert_eq!(exec.call_count(), 0);
    }
}
