mod cleanup;
mod doctor;
mod package;
mod plan;
mod prompt;

pub use cleanup::cleanup;
pub use doctor::doctor;
pub use package::package;
pub use plan::plan;

/// Written next to the archives after `pypack package`.
pub(crate) const ARTIFACTS_FILE: &str = "artifacts.json";

/// Home directory for credential mounts; absent homes only matter when
/// `mount_credentials` is set.
pub(crate) fn home_dir() -> Option<std::path::PathBuf> {
    dirs::home_dir()
}

/// Absolute project root, so recorded archive paths do not depend on the
/// caller's working directory.
pub(crate) fn project_root(project_dir: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    Ok(std::path::absolute(project_dir)?)
}
