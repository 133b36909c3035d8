use std::path::{Path, PathBuf};

use pypack_core::{EffectiveBuildPlan, GlobalSettings, PackManifest, resolve};
use pypack_exec::{
    DockerHost, ErrorDecider, HostError, PipInstaller, ProcessRunner, Readiness, RealRunner,
};

use crate::assemble::{AssembleError, PackageArtifact, PackageAssembler};

/// Where dependencies are installed.
enum Backend<R: ProcessRunner> {
    Local(R),
    Container(DockerHost<R>),
}

/// Drives one packaging run across every eligible function.
///
/// Construction resolves all configuration, so configuration errors surface
/// before anything touches the filesystem.
pub struct PackagingPipeline<R: ProcessRunner = RealRunner> {
    manifest: PackManifest,
    settings: GlobalSettings,
    backend: Backend<R>,
}

impl PackagingPipeline<RealRunner> {
    /// Load `pypack.toml` from `project_root` and resolve settings.
    pub fn load(project_root: &Path, home_dir: Option<&Path>) -> Result<Self, PipelineError> {
        let manifest =
            PackManifest::load(project_root).map_err(|e| PipelineError::Config { source: e })?;
        Self::with_runner(manifest, project_root, home_dir, RealRunner)
    }
}

impl<R: ProcessRunner> PackagingPipeline<R> {
    pub fn with_runner(
        manifest: PackManifest,
        project_root: &Path,
        home_dir: Option<&Path>,
        runner: R,
    ) -> Result<Self, PipelineError> {
        let settings = GlobalSettings::from_manifest(&manifest, project_root, home_dir)
            .map_err(|e| PipelineError::Config { source: e })?;
        let backend = match &settings.container {
            Some(container) => {
                Backend::Container(DockerHost::with_runner(runner, container.clone(), project_root))
            }
            None => Backend::Local(runner),
        };
        Ok(Self {
            manifest,
            settings,
            backend,
        })
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// Effective plans for every eligible function, in manifest order.
    pub fn plans(&self) -> Result<Vec<EffectiveBuildPlan>, PipelineError> {
        self.manifest
            .eligible_functions()
            .map(|f| {
                resolve(&self.settings, f).map_err(|e| PipelineError::Plan {
                    function: f.name.clone(),
                    source: e,
                })
            })
            .collect()
    }

    /// Package every eligible function, one at a time.
    ///
    /// A function failure never rolls back archives already produced. The
    /// run stops at the first failure when `fail_fast` is set, and always on
    /// installer launch failures, container failures, and operator aborts.
    pub async fn package(&self, decider: &dyn ErrorDecider) -> Result<PackageReport, PipelineError> {
        let build_root = &self.settings.build_root;
        std::fs::create_dir_all(build_root).map_err(|e| PipelineError::BuildRoot {
            path: build_root.clone(),
            source: e,
        })?;

        let mut report = PackageReport {
            skipped: self
                .manifest
                .functions
                .iter()
                .filter(|f| !f.is_python(&self.manifest.runtime))
                .map(|f| f.name.clone())
                .collect(),
            ..Default::default()
        };

        let installer = match &self.backend {
            Backend::Local(runner) => {
                PipInstaller::local(runner, self.settings.stderr_policy, decider)
            }
            Backend::Container(host) => {
                let readiness = host
                    .ensure_ready()
                    .await
                    .map_err(|e| PipelineError::Host { source: e })?;
                report.container = Some(readiness);
                PipInstaller::in_container(host, self.settings.stderr_policy, decider)
            }
        }
        .pip_cmd(self.settings.pip_cmd.clone())
        .pip_args(self.settings.pip_args.clone());

        let assembler = PackageAssembler::new(&self.settings, &installer);

        for function in self.manifest.eligible_functions() {
            let result = match resolve(&self.settings, function) {
                Ok(plan) => assembler.assemble(&plan).await,
                Err(e) => Err(AssembleError::Plan { source: e }),
            };
            match result {
                Ok(artifact) => report.packaged.push(artifact),
                Err(e) => {
                    tracing::error!(function = %function.name, error = %e, "packaging failed");
                    let stop = e.stops_run() || self.settings.fail_fast;
                    report.failed.push(FunctionFailure {
                        function: function.name.clone(),
                        error: e,
                    });
                    if stop {
                        report.stopped_early = true;
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Remove the build root and tear down the builder container.
    ///
    /// Returns `None` when cleanup is disabled. Failures are logged and
    /// reflected in the report, never returned.
    pub async fn cleanup(&self) -> Option<CleanupReport> {
        if !self.settings.cleanup {
            tracing::info!("cleanup disabled; keeping build directory");
            return None;
        }

        let build_root = &self.settings.build_root;
        tracing::info!(path = %build_root.display(), "cleaning build directory");
        let removed_build_root = match std::fs::remove_dir_all(build_root) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                tracing::warn!(path = %build_root.display(), error = %e, "failed to remove build directory");
                false
            }
        };

        let stopped_container = match &self.backend {
            Backend::Container(host) => {
                host.teardown().await;
                true
            }
            Backend::Local(_) => false,
        };

        Some(CleanupReport {
            build_root: build_root.clone(),
            removed_build_root,
            stopped_container,
        })
    }
}

/// Outcome of a packaging run.
#[derive(Debug, Default)]
pub struct PackageReport {
    pub packaged: Vec<PackageArtifact>,
    pub failed: Vec<FunctionFailure>,
    /// Functions left out because of their runtime
    pub skipped: Vec<String>,
    /// What the builder container needed, when one is used
    pub container: Option<Readiness>,
    /// Whether remaining functions were left unpackaged after a failure
    pub stopped_early: bool,
}

impl PackageReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Function name to archive path, in packaging order.
    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.packaged
            .iter()
            .map(|a| (a.function.as_str(), a.archive.as_path()))
    }
}

#[derive(Debug)]
pub struct FunctionFailure {
    pub function: String,
    pub error: AssembleError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub build_root: PathBuf,
    pub removed_build_root: bool,
    pub stopped_container: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid packaging configuration")]
    Config { source: pypack_core::Error },

    #[error("invalid build plan for '{function}'")]
    Plan {
        function: String,
        source: pypack_core::Error,
    },

    #[error("failed to create build directory {path}")]
    BuildRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("builder container is not available")]
    Host { source: HostError },
}
