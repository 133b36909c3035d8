use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime family this tool packages. Matched case-insensitively as a substring.
pub const SUPPORTED_RUNTIME: &str = "python";

/// A function declared in the manifest.
///
/// # Examples
///
/// ```
/// use pypack_core::FunctionSpec;
///
/// let f = FunctionSpec::new("hello");
/// assert!(f.is_python("python3.9"));
/// assert!(!f.is_python("nodejs18.x"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    /// Falls back to the service runtime when omitted
    #[serde(default)]
    pub runtime: Option<String>,
    /// Files and directories copied into the build directory
    #[serde(default)]
    pub include: Vec<String>,
    /// Gitignore-style patterns skipped while copying
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Inline requirement lines, written as the function's requirements file
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub skip_install: bool,
    /// Archive output path. Defaults to `<build_dir>/<name>.zip`.
    #[serde(default)]
    pub artifact: Option<PathBuf>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether this function targets the python runtime family, using
    /// `service_runtime` when the function declares none.
    pub fn is_python(&self, service_runtime: &str) -> bool {
        self.runtime
            .as_deref()
            .unwrap_or(service_runtime)
            .to_ascii_lowercase()
            .contains(SUPPORTED_RUNTIME)
    }
}
