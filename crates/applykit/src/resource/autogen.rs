//! Autogen template - generates a Deployment Manager package in a container

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::Resource;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::{Invocation, Metadata, TypeMeta};

/// Name of the spec file inside the input mount
pub const INPUT_FILE: &str = "autogen.yaml";
/// Mount point of the input directory inside the generator container
pub const CONTAINER_INPUT_DIR: &str = "/autogen";
/// Mount point of the output directory inside the generator container
pub const CONTAINER_OUTPUT_DIR: &str = "/tmp/out";

/// Runs the autogen image over an embedded spec
///
/// On success the generated package sits in [`output_dir`](Resource::output_dir),
/// a fresh directory per apply so repeated runs never collide.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManagerAutogenTemplate {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub partner_id: String,
    #[serde(default)]
    pub solution_id: String,
    /// Spec handed to the generator verbatim
    #[serde(default)]
    pub autogen_spec: Value,
    /// Overrides the configured generator image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip)]
    output_dir: RwLock<Option<PathBuf>>,
}

impl DeploymentManagerAutogenTemplate {
    pub const KIND: &'static str = "DeploymentManagerAutogenTemplate";

    pub fn new(name: impl Into<String>, autogen_spec: Value) -> Self {
        Self {
            type_meta: TypeMeta::new(Self::KIND),
            metadata: Metadata::named(name),
            autogen_spec,
            ..Default::default()
        }
    }

    pub fn with_ids(
        mut self,
        partner_id: impl Into<String>,
        solution_id: impl Into<String>,
    ) -> Self {
        self.partner_id = partner_id.into();
        self.solution_id = solution_id.into();
        self
    }

    /// Mark the template as already generated into `dir`
    pub fn with_output_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.set_output_dir(dir.into());
        self
    }

    fn set_output_dir(&self, dir: PathBuf) {
        match self.output_dir.write() {
            Ok(mut guard) => *guard = Some(dir),
            Err(poisoned) => *poisoned.into_inner() = Some(dir),
        }
    }

    /// Spec as written to the generator's input file
    ///
    /// `partnerId` and `solutionId` are filled in from the template when the
    /// spec itself leaves them out.
    pub fn input_document(&self) -> Value {
        let mut spec = self.autogen_spec.clone();
        if let Value::Mapping(map) = &mut spec {
            let ids = [
                ("partnerId", &self.partner_id),
                ("solutionId", &self.solution_id),
            ];
            for (key, value) in ids {
                if !value.is_empty() && !map.contains_key(key) {
                    map.insert(Value::from(key), Value::from(value.as_str()));
                }
            }
        }
        spec
    }

    /// Build the `docker run` invocation for the given host directories
    pub fn generator_invocation(
        &self,
        registry: &Registry<'_>,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Invocation {
        let settings = registry.settings();
        let image = self.image.as_deref().unwrap_or(&settings.autogen.image);

        Invocation::new(&settings.tools.docker)
            .args(["run", "--rm", "-i"])
            .arg("--mount")
            .arg(bind_mount(output_dir, CONTAINER_OUTPUT_DIR))
            .arg("--mount")
            .arg(bind_mount(input_dir, CONTAINER_INPUT_DIR))
            .arg(image)
            .args(["--input_type", "YAML", "--single_input"])
            .arg(format!("{CONTAINER_INPUT_DIR}/{INPUT_FILE}"))
            .args(["--output_type", "PACKAGE", "--output", CONTAINER_OUTPUT_DIR])
    }
}

/// `--mount` value for a bind mount of `src` at `dst`
pub fn bind_mount(src: &Path, dst: &str) -> String {
    format!("type=bind,src={},dst={}", src.display(), dst)
}

impl Resource for DeploymentManagerAutogenTemplate {
    fn type_meta(&self) -> &TypeMeta {
        &self.type_meta
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn description(&self) -> String {
        format!("Autogen package for {}/{}", self.partner_id, self.solution_id)
    }

    fn output_dir(&self) -> Option<PathBuf> {
        match self.output_dir.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn apply(&self, registry: &Registry<'_>) -> Result<()> {
        let tmp = std::env::temp_dir();

        // Input only lives for the duration of the run
        let input_dir = tempfile::Builder::new()
            .prefix("autogen")
            .tempdir()
            .map_err(Error::io(&tmp))?;
        let input_file = input_dir.path().join(INPUT_FILE);
        let document = serde_yaml::to_string(&self.input_document())?;
        fs::write(&input_file, document).map_err(Error::io(&input_file))?;

        // Dropped (and removed) on failure; kept only once the run succeeds
        let output_dir = tempfile::Builder::new()
            .prefix("autogen-out")
            .tempdir()
            .map_err(Error::io(&tmp))?;

        let invocation = self.generator_invocation(registry, input_dir.path(), output_dir.path());
        log::info!("Generating {} into {}", self.name(), output_dir.path().display());
        registry.executor().run_checked(&invocation)?;

        self.set_output_dir(output_dir.keep());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use crate::types::CommandOutput;
    use regex::Regex;
    use std::sync::{Arc, Mutex};

    const SPEC: &str = r"
partnerId: testPartner
solutionId: testSolution
spec:
  singleVm:
    adminUrl:
      path: wp-admin
      scheme: HTTP
    bootDisk:
      diskSize:
        defaultSizeGb: 10
        minSizeGb: 10
";

    // argv indexes of the mount values in `docker run ...`
    const OUTPUT_MOUNT_IDX: usize = 5;
    const INPUT_MOUNT_IDX: usize = 7;

    fn spec() -> Value {
        serde_yaml::from_str(SPEC).unwrap()
    }

    fn input_mount_regex() -> Regex {
        let tmp = std::env::temp_dir();
        let tmp = tmp.to_string_lossy();
        Regex::new(&format!(
            "^type=bind,src={}/?autogen(.*),dst=/autogen$",
            regex::escape(tmp.trim_end_matches('/'))
        ))
        .unwrap()
    }

    #[test]
    fn test_apply_runs_generator_with_spec_on_disk() {
        let seen_spec: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&seen_spec);

        let exec = RecordingExecutor::with_responder(move |inv| {
            // The input file must exist while the generator runs
            let argv = inv.argv();
            let src = argv[INPUT_MOUNT_IDX]
                .trim_start_matches("type=bind,src=")
                .trim_end_matches(",dst=/autogen");
            let content = fs::read_to_string(Path::new(src).join(INPUT_FILE)).unwrap();
            *seen.lock().unwrap() = Some(serde_yaml::from_str(&content).unwrap());
            Ok(CommandOutput::succeeded())
        });

        let mut registry = Registry::new(&exec);
        registry.register(
            Box::new(
                DeploymentManagerAutogenTemplate::new("autogen", spec())
                    .with_ids("testPartner1", "testSolution1"),
            ),
            "dir2",
        );
        registry.apply().unwrap();

        let calls = exec.argvs();
        assert_eq!(calls.len(), 1);
        let argv = &calls[0];
        assert!(input_mount_regex().is_match(&argv[INPUT_MOUNT_IDX]));

        let out = registry.get("autogen").unwrap().output_dir().unwrap();
        assert!(out.is_dir());

        let expected = vec![
            "docker".to_string(),
            "run".into(),
            "--rm".into(),
            "-i".into(),
            "--mount".into(),
            format!("type=bind,src={},dst=/tmp/out", out.display()),
            "--mount".into(),
            argv[INPUT_MOUNT_IDX].clone(),
            "gcr.io/cloud-marketplace-tools/dm/autogen".into(),
            "--input_type".into(),
            "YAML".into(),
            "--single_input".into(),
            "/autogen/autogen.yaml".into(),
            "--output_type".into(),
            "PACKAGE".into(),
            "--output".into(),
            "/tmp/out".into(),
        ];
        assert_eq!(argv, &expected);

        // Spec ids win over the template's ids
        assert_eq!(seen_spec.lock().unwrap().clone(), Some(spec()));

        fs::remove_dir_all(out).unwrap();
    }

    #[test]
    fn test_input_dir_removed_after_apply() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(
            Box::new(DeploymentManagerAutogenTemplate::new("autogen", spec())),
            "dir2",
        );
        registry.apply().unwrap();

        let argv = &exec.argvs()[0];
        let src = argv[INPUT_MOUNT_IDX]
            .trim_start_matches("type=bind,src=")
            .trim_end_matches(",dst=/autogen")
            .to_string();
        assert!(!Path::new(&src).exists());

        let out = registry.get("autogen").unwrap().output_dir().unwrap();
        fs::remove_dir_all(out).unwrap();
    }

    #[test]
    fn test_repeated_apply_uses_fresh_output_dir() {
        let exec = RecordingExecutor::new();
        let mut registry = Registry::new(&exec);
        registry.register(
            Box::new(DeploymentManagerAutogenTemplate::new("autogen", spec())),
            "dir2",
        );

        registry.apply().unwrap();
        let first = registry.get("autogen").unwrap().output_dir().unwrap();
        registry.apply().unwrap();
        let second = registry.get("autogen").unwrap().output_dir().unwrap();

        assert_ne!(first, second);
        let calls = exec.argvs();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), calls[1].len());
        assert_eq!(calls[0][..5], calls[1][..5]);
        assert_eq!(calls[0][8..], calls[1][8..]);

        fs::remove_dir_all(first).unwrap();
        fs::remove_dir_all(second).unwrap();
    }

    #[test]
    fn test_failed_generator_leaves_no_output_dir() {
        let exec = RecordingExecutor::failing_on("docker", "pull access denied");
        let mut registry = Registry::new(&exec);
        registry.register(
            Box::new(DeploymentManagerAutogenTemplate::new("autogen", spec())),
            "dir2",
        );

        let err = registry.apply().unwrap_err();
        assert!(err.is_command_error());
        assert!(err.to_string().contains("pull access denied"));
        assert!(registry.get("autogen").unwrap().output_dir().is_none());

        // The output directory goes away with the failed run
        let argv = &exec.argvs()[0];
        let out = argv[OUTPUT_MOUNT_IDX]
            .trim_start_matches("type=bind,src=")
            .trim_end_matches(",dst=/tmp/out");
        assert!(out.contains("autogen-out"));
        assert!(!Path::new(out).exists());
    }

    #[test]
    fn test_input_document_fills_missing_ids() {
        let template = DeploymentManagerAutogenTemplate::new(
            "autogen",
            serde_yaml::from_str("spec: {}").unwrap(),
        )
        .with_ids("partner", "solution");

        let doc = template.input_document();
        assert_eq!(doc["partnerId"], Value::from("partner"));
        assert_eq!(doc["solutionId"], Value::from("solution"));
    }

    #[test]
    fn test_image_override() {
        let exec = RecordingExecutor::new();
        let registry = Registry::new(&exec);
        let mut template = DeploymentManagerAutogenTemplate::new("autogen", spec());
        template.image = Some("example.com/autogen:dev".to_string());

        let inv = template.generator_invocation(&registry, Path::new("/in"), Path::new("/out"));
        assert_eq!(inv.args[4], "type=bind,src=/out,dst=/tmp/out");
        assert_eq!(inv.args[6], "type=bind,src=/in,dst=/autogen");
        assert_eq!(inv.args[7], "example.com/autogen:dev");
    }

    #[test]
    fn test_output_dir_unset_until_applied() {
        let template = DeploymentManagerAutogenTemplate::new("autogen", spec());
        assert!(template.output_dir().is_none());

        let template = template.with_output_dir("/tmp/outdir");
        assert_eq!(template.output_dir(), Some(PathBuf::from("/tmp/outdir")));
    }
}
