//! `pip install` into a function's build directory.
//!
//! ```text
//! install(function, build_dir, requirements)
//!   1. Missing / empty file ── Skipped, nothing runs
//!   2. Version check        ── pip --version (once), enables --no-warn-conflicts on pip >= 10
//!   3. Install              ── pip install -t <dir> -r <file> --upgrade [args]
//!                              (docker exec <name> ... with container paths)
//!   4. Classify output      ── benign / infrastructure / unrecognised → StderrPolicy
//!                              (a non-zero exit is never benign)
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pypack_core::StderrPolicy;

use crate::container::DockerHost;
use crate::executor::{ProcessRunner, args};
use crate::process::{ProcessError, ProcessOutput, format_status};
use crate::stderr::{Site, StderrClass, classify};

/// First pip release accepting `--no-warn-conflicts`.
const CONFLICT_FLAG_MIN_MAJOR: u32 = 10;

/// `docker exec` exit codes for a daemon error, a command that cannot be
/// invoked, and a command that was not found.
const DOCKER_EXEC_FAILURES: &[i32] = &[125, 126, 127];

/// Operator answer when pip reports unrecognised errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort,
}

/// Asks whether packaging should continue after unrecognised installer output.
///
/// The CLI prompts on the terminal; tests and `--yes` runs use [`FixedDecider`].
pub trait ErrorDecider: Send + Sync {
    fn decide(&self, function: &str, requirements: &Path, stderr: &str) -> Decision;
}

/// Always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecider(pub Decision);

impl ErrorDecider for FixedDecider {
    fn decide(&self, _function: &str, _requirements: &Path, _stderr: &str) -> Decision {
        self.0
    }
}

/// Result of one installer invocation that did not fail the function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The requirements file was missing or empty; nothing ran.
    Skipped { requirements: PathBuf },
    Installed {
        requirements: PathBuf,
        output: ProcessOutput,
        class: StderrClass,
        /// Set when the operator was asked to confirm.
        decision: Option<Decision>,
    },
}

impl InstallOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Where pip runs.
enum Target<'a, R: ProcessRunner> {
    Local(&'a R),
    Container(&'a DockerHost<R>),
}

/// Installs requirement files with pip, locally or inside the builder container.
pub struct PipInstaller<'a, R: ProcessRunner> {
    target: Target<'a, R>,
    pip_cmd: String,
    pip_args: Vec<String>,
    policy: StderrPolicy,
    decider: &'a dyn ErrorDecider,
    conflict_flag: OnceLock<bool>,
}

impl<'a, R: ProcessRunner> PipInstaller<'a, R> {
    /// Run pip directly on this machine.
    pub fn local(runner: &'a R, policy: StderrPolicy, decider: &'a dyn ErrorDecider) -> Self {
        Self::new(Target::Local(runner), policy, decider)
    }

    /// Run pip through `docker exec` in the builder container.
    pub fn in_container(
        host: &'a DockerHost<R>,
        policy: StderrPolicy,
        decider: &'a dyn ErrorDecider,
    ) -> Self {
        Self::new(Target::Container(host), policy, decider)
    }

    fn new(target: Target<'a, R>, policy: StderrPolicy, decider: &'a dyn ErrorDecider) -> Self {
        Self {
            target,
            pip_cmd: "pip".to_owned(),
            pip_args: Vec::new(),
            policy,
            decider,
            conflict_flag: OnceLock::new(),
        }
    }

    /// Installer executable, `pip` by default.
    pub fn pip_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.pip_cmd = cmd.into();
        self
    }

    /// Extra arguments appended to every install.
    pub fn pip_args(mut self, extra: Vec<String>) -> Self {
        self.pip_args = extra;
        self
    }

    /// Install `requirements` into `build_dir`.
    ///
    /// # Errors
    ///
    /// - [`InstallError::Launch`] if pip (or docker) cannot be started
    /// - [`InstallError::Infrastructure`] if `docker exec` itself failed (daemon error or exit 125-127)
    /// - [`InstallError::Fatal`] under [`StderrPolicy::Strict`] for any stderr output or failed exit
    /// - [`InstallError::Aborted`] if the operator chose to abort
    pub async fn install(
        &self,
        function: &str,
        build_dir: &Path,
        requirements: &Path,
    ) -> Result<InstallOutcome, InstallError> {
        match std::fs::metadata(requirements) {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                tracing::info!(function, requirements = %requirements.display(), "requirements file is empty; nothing to install");
                return Ok(InstallOutcome::Skipped {
                    requirements: requirements.to_path_buf(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(function, requirements = %requirements.display(), "no requirements file; nothing to install");
                return Ok(InstallOutcome::Skipped {
                    requirements: requirements.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(InstallError::ReadRequirements {
                    path: requirements.to_path_buf(),
                    source: e,
                });
            }
        }

        let mut pip = args(["install", "-t"]);
        pip.push(self.translate(build_dir)?);
        pip.push("-r".to_owned());
        pip.push(self.translate(requirements)?);
        pip.push("--upgrade".to_owned());
        pip.extend(self.pip_args.iter().cloned());
        if self.supports_conflict_flag().await? {
            pip.push("--no-warn-conflicts".to_owned());
        }

        tracing::info!(function, requirements = %requirements.display(), "installing requirements");
        let output = self.run_pip(&pip).await?;

        let (class, stderr) = self.classify_output(&output);

        let decision = self.apply_policy(function, requirements, class, &stderr)?;
        Ok(InstallOutcome::Installed {
            requirements: requirements.to_path_buf(),
            output,
            class,
            decision,
        })
    }

    /// A failed exit is never clean or benign, whatever stderr says.
    fn classify_output(&self, output: &ProcessOutput) -> (StderrClass, String) {
        let site = match self.target {
            Target::Local(_) => Site::Local,
            Target::Container(_) => Site::Container,
        };
        let trimmed = output.stderr.trim();
        if output.success() {
            return (classify(trimmed, site), trimmed.to_owned());
        }

        let exited = format!("installer exited with {}", format_status(output.status));
        let stderr = if trimmed.is_empty() {
            exited
        } else {
            format!("{trimmed}\n{exited}")
        };
        if site == Site::Container
            && output.status.is_some_and(|code| DOCKER_EXEC_FAILURES.contains(&code))
        {
            return (StderrClass::Infrastructure, stderr);
        }
        let class = match classify(trimmed, site) {
            StderrClass::Infrastructure => StderrClass::Infrastructure,
            _ => StderrClass::Unrecognized,
        };
        (class, stderr)
    }

    fn apply_policy(
        &self,
        function: &str,
        requirements: &Path,
        class: StderrClass,
        stderr: &str,
    ) -> Result<Option<Decision>, InstallError> {
        let fatal = || InstallError::Fatal {
            function: function.to_owned(),
            requirements: requirements.to_path_buf(),
            stderr: stderr.to_owned(),
        };

        match (class, self.policy) {
            (StderrClass::Clean, _) => Ok(None),
            (StderrClass::Infrastructure, _) => Err(InstallError::Infrastructure {
                stderr: stderr.to_owned(),
            }),
            (_, StderrPolicy::Strict) => Err(fatal()),
            (StderrClass::Benign, _) => {
                tracing::warn!(function, %stderr, "installer reported warnings");
                Ok(None)
            }
            (StderrClass::Unrecognized, StderrPolicy::Tolerate) => {
                tracing::warn!(function, %stderr, "installer reported errors; continuing");
                Ok(None)
            }
            (StderrClass::Unrecognized, StderrPolicy::Confirm) => {
                match self.decider.decide(function, requirements, stderr) {
                    Decision::Continue => {
                        tracing::warn!(function, "operator chose to continue after installer errors");
                        Ok(Some(Decision::Continue))
                    }
                    Decision::Abort => Err(InstallError::Aborted {
                        function: function.to_owned(),
                        requirements: requirements.to_path_buf(),
                    }),
                }
            }
        }
    }

    /// `pip --version` decides whether `--no-warn-conflicts` is accepted. Queried once.
    async fn supports_conflict_flag(&self) -> Result<bool, InstallError> {
        if let Some(supported) = self.conflict_flag.get() {
            return Ok(*supported);
        }
        let output = self.run_pip(&args(["--version"])).await?;
        let supported = match parse_pip_major(&output.stdout) {
            Some(major) => major >= CONFLICT_FLAG_MIN_MAJOR,
            None => {
                tracing::warn!(stdout = %output.stdout.trim(), "could not determine pip version");
                false
            }
        };
        tracing::debug!(supported, "pip --no-warn-conflicts support");
        Ok(*self.conflict_flag.get_or_init(|| supported))
    }

    async fn run_pip(&self, pip: &[String]) -> Result<ProcessOutput, InstallError> {
        let result = match &self.target {
            Target::Local(runner) => runner.run(&self.pip_cmd, pip).await,
            Target::Container(host) => {
                let mut cmd = args(["exec", host.name(), self.pip_cmd.as_str()]);
                cmd.extend(pip.iter().cloned());
                host.runner().run("docker", &cmd).await
            }
        };
        result.map_err(|e| InstallError::Launch { source: e })
    }

    /// Host path as seen by pip.
    fn translate(&self, path: &Path) -> Result<String, InstallError> {
        match &self.target {
            Target::Local(_) => path
                .to_str()
                .map(str::to_owned)
                .ok_or_else(|| InstallError::InvalidPath(path.to_path_buf())),
            Target::Container(host) => {
                to_container_path(host.project_root(), host.mount_path(), path)
            }
        }
    }
}

/// Map a host path under `project_root` to the container mount.
pub fn to_container_path(
    project_root: &Path,
    mount_path: &str,
    path: &Path,
) -> Result<String, InstallError> {
    let relative = path
        .strip_prefix(project_root)
        .map_err(|_| InstallError::OutsideMount {
            path: path.to_path_buf(),
            root: project_root.to_path_buf(),
        })?;
    let mut translated = mount_path.trim_end_matches('/').to_owned();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| InstallError::InvalidPath(path.to_path_buf()))?;
        translated.push('/');
        translated.push_str(part);
    }
    if translated.is_empty() {
        translated.push('/');
    }
    Ok(translated)
}

/// Major version from `pip X.Y.Z from ... (python 3.x)`.
fn parse_pip_major(version_output: &str) -> Option<u32> {
    let mut words = version_output.split_whitespace();
    if words.next()? != "pip" {
        return None;
    }
    words
        .next()?
        .split('.')
        .next()?
        .parse()
        // arch-lint: allow(no-silent-result-drop) reason="an unparseable version is reported as unknown by the caller"
        .ok()
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("installer could not be started")]
    Launch { source: ProcessError },

    #[error("failed to read requirements file {path}")]
    ReadRequirements {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("builder container failure while installing dependencies:\n{stderr}")]
    Infrastructure { stderr: String },

    #[error("installing {} for '{function}' failed:\n{stderr}", requirements.display())]
    Fatal {
        function: String,
        requirements: PathBuf,
        stderr: String,
    },

    #[error("packaging aborted by operator while installing {} for '{function}'", requirements.display())]
    Aborted {
        function: String,
        requirements: PathBuf,
    },

    #[error("{path} is outside the project root {root} mounted into the builder container")]
    OutsideMount { path: PathBuf, root: PathBuf },

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
}

impl InstallError {
    /// Errors that should stop the whole run, not just the current function.
    pub fn stops_run(&self) -> bool {
        matches!(
            self,
            Self::Launch { .. } | Self::Infrastructure { .. } | Self::Aborted { .. }
        )
    }
}
