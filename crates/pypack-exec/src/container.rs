//! Docker builder container lifecycle.
//!
//! One long-lived container per packaging run. The project root is mounted
//! into it so pip can install straight into each function's build directory.
//!
//! ```text
//! ensure_ready()
//!   absent   ── docker images -q → docker pull (if missing) → docker run -d
//!   other project mounted ── docker rm -f → recreate
//!   running  ── reuse
//!   stopped  ── docker start (docker rm -f + recreate if that fails)
//! teardown()
//!   docker stop → docker rm   (failures logged only)
//! ```

use std::path::{Path, PathBuf};

use pypack_core::ContainerSettings;

use crate::executor::{ProcessRunner, RealRunner, args};
use crate::process::ProcessError;

const DOCKER: &str = "docker";

/// Mount point for the credentials directory inside the container.
pub const CREDENTIALS_MOUNT: &str = "/root/.ssh";

/// Observed state of the builder container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Running,
    Stopped,
    Absent,
}

/// What [`DockerHost::ensure_ready`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Reused,
    Restarted,
    Recreated,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

impl Mount {
    fn to_arg(&self) -> Result<String, HostError> {
        let host = self
            .host
            .to_str()
            .ok_or_else(|| HostError::InvalidPath(self.host.clone()))?;
        let mut arg = format!("{host}:{}", self.container);
        if self.read_only {
            arg.push_str(":ro");
        }
        Ok(arg)
    }
}

/// Builder container handle, parameterized over the runner for testability.
pub struct DockerHost<R: ProcessRunner = RealRunner> {
    runner: R,
    settings: ContainerSettings,
    project_root: PathBuf,
}

impl DockerHost<RealRunner> {
    pub fn new(settings: ContainerSettings, project_root: &Path) -> Self {
        Self::with_runner(RealRunner, settings, project_root)
    }
}

impl<R: ProcessRunner> DockerHost<R> {
    pub fn with_runner(runner: R, settings: ContainerSettings, project_root: &Path) -> Self {
        Self {
            runner,
            settings,
            project_root: project_root.to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn image(&self) -> &str {
        &self.settings.image
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn mount_path(&self) -> &str {
        &self.settings.mount_path
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Bind mounts passed to `docker run`.
    pub fn mounts(&self) -> Vec<Mount> {
        let mut mounts = vec![Mount {
            host: self.project_root.clone(),
            container: self.settings.mount_path.clone(),
            read_only: false,
        }];
        if let Some(dir) = &self.settings.credentials_dir {
            mounts.push(Mount {
                host: dir.clone(),
                container: CREDENTIALS_MOUNT.to_owned(),
                read_only: true,
            });
        }
        mounts
    }

    /// Look the container up by exact name among running and stopped containers.
    pub async fn status(&self) -> Result<HostStatus, HostError> {
        let cmd = args([
            "ps",
            "-a",
            "--filter",
            &format!("name=^/?{}$", self.settings.name),
            "--format",
            "{{.Names}}\t{{.State}}",
        ]);
        let stdout = self.docker(&cmd, "inspect container").await?;

        let state = stdout.lines().find_map(|line| {
            let (name, state) = line.split_once('\t')?;
            (name.trim().trim_start_matches('/') == self.settings.name).then(|| state.trim())
        });
        Ok(match state {
            Some("running") => HostStatus::Running,
            Some(_) => HostStatus::Stopped,
            None => HostStatus::Absent,
        })
    }

    /// Make sure a running builder container exists, creating it if needed.
    ///
    /// An existing container is only kept when it mounts this project root at
    /// the configured mount path; otherwise it is replaced.
    pub async fn ensure_ready(&self) -> Result<Readiness, HostError> {
        let status = self.status().await?;
        if status == HostStatus::Absent {
            self.ensure_image().await?;
            self.create().await?;
            return Ok(Readiness::Created);
        }

        let mounted = self.mounted_project().await?;
        if mounted.as_deref() != Some(self.project_root.as_path()) {
            tracing::warn!(
                container = %self.settings.name,
                mounted = ?mounted,
                project = %self.project_root.display(),
                "builder container mounts a different project; recreating"
            );
            self.remove_forcefully().await?;
            self.ensure_image().await?;
            self.create().await?;
            return Ok(Readiness::Recreated);
        }

        if status == HostStatus::Running {
            tracing::info!(container = %self.settings.name, "reusing running builder container");
            return Ok(Readiness::Reused);
        }

        tracing::info!(container = %self.settings.name, "restarting stopped builder container");
        let start = args(["start", &self.settings.name]);
        match self.docker(&start, "start container").await {
            Ok(_) => Ok(Readiness::Restarted),
            Err(HostError::Command { stderr, .. }) => {
                tracing::warn!(
                    container = %self.settings.name,
                    %stderr,
                    "restart failed; recreating builder container"
                );
                self.remove_forcefully().await?;
                self.create().await?;
                Ok(Readiness::Recreated)
            }
            Err(e) => Err(e),
        }
    }

    /// Host directory bound at the mount path, if any.
    async fn mounted_project(&self) -> Result<Option<PathBuf>, HostError> {
        let cmd = args([
            "inspect",
            "--format",
            "{{range .Mounts}}{{.Source}}\t{{.Destination}}\n{{end}}",
            &self.settings.name,
        ]);
        let stdout = self.docker(&cmd, "inspect container mounts").await?;
        Ok(parse_mount_source(&stdout, &self.settings.mount_path))
    }

    async fn remove_forcefully(&self) -> Result<(), HostError> {
        let remove = args(["rm", "-f", &self.settings.name]);
        self.docker(&remove, "remove container").await?;
        Ok(())
    }

    /// Stop and remove the container. Failures are logged, never returned.
    pub async fn teardown(&self) {
        let stop = args(["stop", &self.settings.name]);
        if let Err(e) = self.docker(&stop, "stop container").await {
            tracing::warn!(container = %self.settings.name, error = %e, "failed to stop builder container");
        }
        let remove = args(["rm", &self.settings.name]);
        match self.docker(&remove, "remove container").await {
            Ok(_) => tracing::info!(container = %self.settings.name, "builder container removed"),
            Err(e) => {
                tracing::warn!(container = %self.settings.name, error = %e, "failed to remove builder container");
            }
        }
    }

    /// Pull the image unless it is already present locally.
    async fn ensure_image(&self) -> Result<(), HostError> {
        let image = self.settings.image.as_str();
        let present = self
            .docker(&args(["images", "-q", image]), "list images")
            .await?;
        if !present.trim().is_empty() {
            tracing::debug!(%image, "builder image present");
            return Ok(());
        }
        tracing::info!(%image, "pulling builder image; this may take a while the first time");
        self.docker(&args(["pull", image]), "pull image").await?;
        Ok(())
    }

    async fn create(&self) -> Result<(), HostError> {
        let mut cmd = args(["run", "-d", "--name", &self.settings.name]);
        for mount in self.mounts() {
            cmd.push("-v".to_owned());
            cmd.push(mount.to_arg()?);
        }
        cmd.extend(args([self.settings.image.as_str(), "tail", "-f", "/dev/null"]));

        let id = self.docker(&cmd, "create container").await?;
        tracing::info!(
            container = %self.settings.name,
            image = %self.settings.image,
            id = %id.trim(),
            "builder container started"
        );
        Ok(())
    }

    async fn docker(&self, cmd: &[String], action: &'static str) -> Result<String, HostError> {
        let output = self
            .runner
            .run(DOCKER, cmd)
            .await
            .map_err(|e| HostError::Launch { source: e })?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(HostError::Command {
                action,
                stderr: output.stderr.trim().to_owned(),
            })
        }
    }
}

/// Source of the mount whose destination is `mount_path`, from
/// `docker inspect` lines of `<source>\t<destination>`.
fn parse_mount_source(inspect: &str, mount_path: &str) -> Option<PathBuf> {
    let wanted = mount_path.trim_end_matches('/');
    inspect.lines().find_map(|line| {
        let (source, destination) = line.split_once('\t')?;
        (destination.trim().trim_end_matches('/') == wanted).then(|| PathBuf::from(source.trim()))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("docker could not be started")]
    Launch { source: ProcessError },

    #[error("docker failed to {action}: {stderr}")]
    Command { action: &'static str, stderr: String },

    #[error("mount path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
}
