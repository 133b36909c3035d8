use std::path::{Component, Path, PathBuf};

use pypack_core::{EffectiveBuildPlan, ExcludeSet, GlobalSettings};
use pypack_exec::{InstallError, InstallOutcome, PipInstaller, ProcessRunner};
use walkdir::WalkDir;

use crate::archive::{self, ArchiveError};

/// A packaged function, as reported back to the host.
#[derive(Debug, Clone)]
pub struct PackageArtifact {
    pub function: String,
    pub archive: PathBuf,
    /// Files stored in the archive
    pub files: usize,
    pub installs: Vec<InstallOutcome>,
}

/// Builds one function's build directory and archive.
pub struct PackageAssembler<'a, R: ProcessRunner> {
    settings: &'a GlobalSettings,
    installer: &'a PipInstaller<'a, R>,
}

impl<'a, R: ProcessRunner> PackageAssembler<'a, R> {
    pub fn new(settings: &'a GlobalSettings, installer: &'a PipInstaller<'a, R>) -> Self {
        Self {
            settings,
            installer,
        }
    }

    /// Assemble the build directory for `plan` and zip it.
    ///
    /// 1. Recreate the build directory
    /// 2. Copy includes, skipping excluded paths
    /// 3. Write inline requirements
    /// 4. Install each requirement file (unless skipped)
    /// 5. Archive the build directory
    pub async fn assemble(&self, plan: &EffectiveBuildPlan) -> Result<PackageArtifact, AssembleError> {
        tracing::info!(function = %plan.function, "packaging");

        recreate_dir(&plan.build_dir)?;

        let excludes = plan
            .exclude_set()
            .map_err(|e| AssembleError::Plan { source: e })?;
        for include in &plan.includes {
            let copied = stage_include(
                &self.settings.project_root,
                include,
                &plan.build_dir,
                &excludes,
            )?;
            tracing::debug!(function = %plan.function, %include, files = copied, "include staged");
        }

        let mut installs = Vec::new();
        if plan.skip_install {
            tracing::info!(function = %plan.function, "skipping dependency installation");
        } else {
            if plan.has_inline_requirements() {
                write_inline_requirements(
                    &plan.own_requirements(&self.settings.requirements_file),
                    &plan.inline_requirements,
                )?;
            }
            for requirements in &plan.requirements {
                let outcome = self
                    .installer
                    .install(&plan.function, &plan.build_dir, requirements)
                    .await
                    .map_err(|e| AssembleError::Install { source: e })?;
                installs.push(outcome);
            }
        }

        let files = archive::write_archive(&plan.build_dir, &plan.artifact)
            .map_err(|e| AssembleError::Archive { source: e })?;
        tracing::info!(
            function = %plan.function,
            archive = %plan.artifact.display(),
            files,
            "packaged"
        );

        Ok(PackageArtifact {
            function: plan.function.clone(),
            archive: plan.artifact.clone(),
            files,
            installs,
        })
    }
}

/// Remove `dir` if present and create it empty.
fn recreate_dir(dir: &Path) -> Result<(), AssembleError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| AssembleError::Cleanup {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(dir).map_err(|e| AssembleError::Create {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Copy one include into `build_dir`.
///
/// Directory contents land at the build directory root; a file keeps its
/// path relative to the project root. A candidate is skipped when either
/// its project-relative or its build-relative path is excluded.
///
/// Returns the number of files copied.
pub fn stage_include(
    project_root: &Path,
    include: &str,
    build_dir: &Path,
    excludes: &ExcludeSet,
) -> Result<usize, AssembleError> {
    let source = project_root.join(include);
    let metadata = std::fs::metadata(&source).map_err(|e| AssembleError::MissingInclude {
        include: include.to_owned(),
        path: source.clone(),
        source: e,
    })?;
    let include_rel = normalize(source.strip_prefix(project_root).unwrap_or(Path::new("")));

    if excludes.is_excluded(&include_rel, metadata.is_dir()) {
        tracing::debug!(%include, "include itself is excluded");
        return Ok(0);
    }

    if !metadata.is_dir() {
        let dest_rel = if include_rel.as_os_str().is_empty() {
            PathBuf::from(source.file_name().unwrap_or(source.as_os_str()))
        } else {
            include_rel
        };
        copy_file(&source, &build_dir.join(dest_rel))?;
        return Ok(1);
    }

    let mut copied = 0;
    let walker = WalkDir::new(&source)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_dir();
            let rel = entry.path().strip_prefix(&source).unwrap_or(entry.path());
            let skip = excludes.is_excluded(rel, is_dir)
                || excludes.is_excluded(&include_rel.join(rel), is_dir);
            if skip {
                tracing::trace!(path = %entry.path().display(), "excluded");
            }
            !skip
        });

    for entry in walker {
        let entry = entry.map_err(|e| AssembleError::Walk { source: e })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&source)
            .map_err(|_| AssembleError::Escape(entry.path().to_path_buf()))?;
        copy_file(entry.path(), &build_dir.join(rel))?;
        copied += 1;
    }
    Ok(copied)
}

/// Drop `.` components so `./src` and `src` match the same patterns.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn copy_file(from: &Path, to: &Path) -> Result<(), AssembleError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AssembleError::Create {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::copy(from, to).map_err(|e| AssembleError::CopyFile {
        path: from.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn write_inline_requirements(path: &Path, lines: &[String]) -> Result<(), AssembleError> {
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(path, content).map_err(|e| AssembleError::WriteRequirements {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("invalid build plan")]
    Plan { source: pypack_core::Error },
    #[error("failed to clean up build directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("include {include:?} not found at {path}")]
    MissingInclude {
        include: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk include directory")]
    Walk { source: walkdir::Error },
    #[error("walked path escaped its include root: {0}")]
    Escape(PathBuf),
    #[error("failed to copy file {path}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write inline requirements to {path}")]
    WriteRequirements {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("dependency installation failed")]
    Install { source: InstallError },
    #[error("failed to create archive")]
    Archive { source: ArchiveError },
}

impl AssembleError {
    /// Whether the failure should stop the remaining functions too.
    pub fn stops_run(&self) -> bool {
        matches!(self, Self::Install { source } if source.stops_run())
    }
}
