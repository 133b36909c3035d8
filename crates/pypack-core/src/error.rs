use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no pypack manifest found at {path} — create one with a [package] section")]
    ManifestNotFound { path: PathBuf },

    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Settings resolution ──
    #[error("no [package] configuration detected in pypack.toml — see documentation")]
    MissingPackageSection,

    #[error("no build_dir configuration specified in [package]")]
    MissingBuildDir,

    #[error("build_dir resolves to {path}, which contains the project; cleanup would delete it")]
    BuildDirContainsProject { path: PathBuf },

    #[error("mount_credentials is enabled but no home directory could be determined")]
    CredentialsWithoutHome,

    // ── Function metadata ──
    #[error("function declared with an empty name")]
    EmptyFunctionName,

    #[error("function name {name:?} must be a single directory name")]
    InvalidFunctionName { name: String },

    #[error("function '{name}' is declared more than once")]
    DuplicateFunction { name: String },

    #[error("invalid exclude pattern {pattern:?}")]
    InvalidExcludePattern {
        pattern: String,
        source: ignore::Error,
    },
}
