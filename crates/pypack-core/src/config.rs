use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::function::FunctionSpec;

/// Manifest file name looked up in the project root.
pub const MANIFEST_FILE: &str = "pypack.toml";

/// Build tooling artifacts that never belong in a function archive.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules",
    "**/package.json",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/.serverless",
    "**/__pycache__",
    "**/*.pyc",
    "**/.git",
    "pypack.toml",
];

/// pypack.toml manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackManifest {
    /// Service-wide runtime, used when a function does not declare one
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Packaging configuration. Required; see [`GlobalSettings::from_manifest`].
    pub package: Option<PackageConfig>,
    /// Functions in the order the host enumerates them
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Requirements file name looked up inside each build directory
    #[serde(default = "default_requirements_file")]
    pub requirements_file: String,
    /// Build root. Required.
    pub build_dir: Option<PathBuf>,
    /// Requirement files installed into every function
    #[serde(default)]
    pub global_requirements: Vec<PathBuf>,
    /// Paths copied into every function unless the function excludes them
    #[serde(default)]
    pub global_includes: Vec<String>,
    /// Exclude patterns applied to every function
    #[serde(default)]
    pub global_excludes: Vec<String>,
    /// Remove the build root (and the builder container) after deploy
    #[serde(default = "default_true")]
    pub cleanup: bool,
    /// Install dependencies inside a docker container
    #[serde(default)]
    pub use_container: bool,
    /// Builder image. Defaults to the lambci build image for the runtime.
    #[serde(default)]
    pub container_image: Option<String>,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Mount `~/.ssh` into the container for private dependency sources
    #[serde(default)]
    pub mount_credentials: bool,
    /// Mount point of the project root inside the container
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    #[serde(default = "default_pip_cmd")]
    pub pip_cmd: String,
    /// Extra arguments appended to every `pip install`
    #[serde(default)]
    pub pip_args: Vec<String>,
    /// Ask before continuing when pip reports unrecognised errors
    #[serde(default)]
    pub abort_on_error: bool,
    /// Explicit stderr policy. Overrides `abort_on_error` when set.
    #[serde(default)]
    pub stderr_policy: Option<StderrPolicy>,
    #[serde(default)]
    pub requirements_order: RequirementsOrder,
    /// Stop the run at the first function that fails to package
    #[serde(default = "default_true")]
    pub fail_fast: bool,
}

/// How non-empty installer stderr that is not recognised as benign is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrPolicy {
    /// Log the output and continue.
    Tolerate,
    /// Show the output to the operator and ask whether to continue.
    Confirm,
    /// Any stderr output fails the function, benign or not.
    Strict,
}

/// Whether global requirement files are installed before or after the
/// function's own requirements file. Later installs win on conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementsOrder {
    #[default]
    FunctionFirst,
    GlobalFirst,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            requirements_file: default_requirements_file(),
            build_dir: None,
            global_requirements: Vec::new(),
            global_includes: Vec::new(),
            global_excludes: Vec::new(),
            cleanup: true,
            use_container: false,
            container_image: None,
            container_name: default_container_name(),
            mount_credentials: false,
            mount_path: default_mount_path(),
            pip_cmd: default_pip_cmd(),
            pip_args: Vec::new(),
            abort_on_error: false,
            stderr_policy: None,
            requirements_order: RequirementsOrder::default(),
            fail_fast: true,
        }
    }
}

impl PackManifest {
    /// Load `pypack.toml` from the project directory.
    ///
    /// Unlike most config files a missing manifest is an error: packaging
    /// cannot proceed without a build directory.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(MANIFEST_FILE);
        if !config_path.exists() {
            return Err(crate::Error::ManifestNotFound { path: config_path });
        }
        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.clone(),
                source: e,
            })?;
        let manifest: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path,
            source: e,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Function names must be non-empty, unique, and usable as a single
    /// directory name under the build root.
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for function in &self.functions {
            if function.name.trim().is_empty() {
                return Err(crate::Error::EmptyFunctionName);
            }
            if !is_plain_name(&function.name) {
                return Err(crate::Error::InvalidFunctionName {
                    name: function.name.clone(),
                });
            }
            if !seen.insert(function.name.as_str()) {
                return Err(crate::Error::DuplicateFunction {
                    name: function.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Functions that belong to this packaging run, in manifest order.
    pub fn eligible_functions(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.functions.iter().filter(|f| {
            let eligible = f.is_python(&self.runtime);
            if !eligible {
                tracing::debug!(
                    function = %f.name,
                    runtime = f.runtime.as_deref().unwrap_or(&self.runtime),
                    "skipping function with non-python runtime"
                );
            }
            eligible
        })
    }
}

/// Docker builder settings, present only when `use_container` is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSettings {
    pub image: String,
    pub name: String,
    /// Where the project root is mounted inside the container
    pub mount_path: String,
    /// Host directory mounted read-only at `/root/.ssh`
    pub credentials_dir: Option<PathBuf>,
}

/// Resolved, immutable settings for one packaging run.
///
/// All paths are absolute or anchored at `project_root`; nothing here reads
/// the process working directory or environment.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub project_root: PathBuf,
    pub runtime: String,
    pub requirements_file: String,
    pub build_root: PathBuf,
    pub global_requirements: Vec<PathBuf>,
    pub global_includes: Vec<String>,
    pub global_excludes: Vec<String>,
    pub default_excludes: Vec<String>,
    pub cleanup: bool,
    pub container: Option<ContainerSettings>,
    pub pip_cmd: String,
    pub pip_args: Vec<String>,
    pub stderr_policy: StderrPolicy,
    pub requirements_order: RequirementsOrder,
    pub fail_fast: bool,
}

impl GlobalSettings {
    /// Resolve settings from a parsed manifest.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingPackageSection`](crate::Error::MissingPackageSection) without `[package]`
    /// - [`Error::MissingBuildDir`](crate::Error::MissingBuildDir) without `build_dir`
    /// - [`Error::BuildDirContainsProject`](crate::Error::BuildDirContainsProject) if the
    ///   build root is the project root or one of its ancestors
    /// - [`Error::CredentialsWithoutHome`](crate::Error::CredentialsWithoutHome) if credentials
    ///   should be mounted but `home_dir` is `None`
    /// - any [`PackManifest::validate`] error
    pub fn from_manifest(
        manifest: &PackManifest,
        project_root: &Path,
        home_dir: Option<&Path>,
    ) -> crate::Result<Self> {
        manifest.validate()?;
        let config = manifest
            .package
            .as_ref()
            .ok_or(crate::Error::MissingPackageSection)?;
        let build_dir = config
            .build_dir
            .as_ref()
            .ok_or(crate::Error::MissingBuildDir)?;

        let build_root = normalize(&project_root.join(build_dir));
        if normalize(project_root).starts_with(&build_root) {
            return Err(crate::Error::BuildDirContainsProject { path: build_root });
        }

        let container = if config.use_container {
            let credentials_dir = if config.mount_credentials {
                let home = home_dir.ok_or(crate::Error::CredentialsWithoutHome)?;
                Some(home.join(".ssh"))
            } else {
                None
            };
            Some(ContainerSettings {
                image: config
                    .container_image
                    .clone()
                    .unwrap_or_else(|| default_container_image(&manifest.runtime)),
                name: config.container_name.clone(),
                mount_path: config.mount_path.clone(),
                credentials_dir,
            })
        } else {
            None
        };

        let stderr_policy = config.stderr_policy.unwrap_or(if config.abort_on_error {
            StderrPolicy::Confirm
        } else {
            StderrPolicy::Tolerate
        });

        Ok(Self {
            project_root: project_root.to_path_buf(),
            runtime: manifest.runtime.clone(),
            requirements_file: config.requirements_file.clone(),
            build_root,
            global_requirements: config
                .global_requirements
                .iter()
                .map(|p| project_root.join(p))
                .collect(),
            global_includes: config.global_includes.clone(),
            global_excludes: config.global_excludes.clone(),
            default_excludes: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_owned()).collect(),
            cleanup: config.cleanup,
            container,
            pip_cmd: config.pip_cmd.clone(),
            pip_args: config.pip_args.clone(),
            stderr_policy,
            requirements_order: config.requirements_order,
            fail_fast: config.fail_fast,
        })
    }
}

/// True for a single `Normal` path component, e.g. `hello` but not `a/b` or `..`.
fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(Component::ParentDir),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Builder image matching the Lambda runtime, e.g. `lambci/lambda:build-python3.9`.
pub fn default_container_image(runtime: &str) -> String {
    format!("lambci/lambda:build-{runtime}")
}

fn default_runtime() -> String {
    "python3.9".to_owned()
}

fn default_requirements_file() -> String {
    "requirements.txt".to_owned()
}

fn default_container_name() -> String {
    "pypack-builder".to_owned()
}

fn default_mount_path() -> String {
    "/var/task".to_owned()
}

fn default_pip_cmd() -> String {
    "pip".to_owned()
}

fn default_true() -> bool {
    true
}
