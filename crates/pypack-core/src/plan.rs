//! Per-function build plan resolution.
//!
//! [`resolve`] merges [`GlobalSettings`] with one [`FunctionSpec`]. It reads
//! nothing from disk and writes nothing; every packaging run recomputes the
//! plans from scratch.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{GlobalSettings, RequirementsOrder};
use crate::exclude::ExcludeSet;
use crate::function::FunctionSpec;

/// The fully merged configuration used to package one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveBuildPlan {
    pub function: String,
    /// Function includes first, then global includes the function does not exclude
    pub includes: Vec<String>,
    /// Function excludes, then default excludes, then global excludes
    pub excludes: Vec<String>,
    /// Requirement files installed in order into `build_dir`
    pub requirements: Vec<PathBuf>,
    /// Inline requirement lines written to the function's requirements file
    pub inline_requirements: Vec<String>,
    pub skip_install: bool,
    pub build_dir: PathBuf,
    pub artifact: PathBuf,
}

impl EffectiveBuildPlan {
    /// Compile the merged exclude list.
    pub fn exclude_set(&self) -> crate::Result<ExcludeSet> {
        ExcludeSet::new(&self.excludes)
    }

    /// The function's own requirements file inside its build directory.
    ///
    /// Inline requirements are written here, never to an externally supplied file.
    pub fn own_requirements(&self, requirements_file: &str) -> PathBuf {
        self.build_dir.join(requirements_file)
    }

    pub fn has_inline_requirements(&self) -> bool {
        !self.inline_requirements.is_empty()
    }
}

/// Merge global settings with one function's declaration.
///
/// # Errors
///
/// Returns [`Error::InvalidExcludePattern`](crate::Error::InvalidExcludePattern)
/// if the function's exclude patterns do not compile.
pub fn resolve(
    settings: &GlobalSettings,
    function: &FunctionSpec,
) -> crate::Result<EffectiveBuildPlan> {
    let function_excludes = ExcludeSet::new(&function.exclude)?;

    let mut includes = function.include.clone();
    for global in &settings.global_includes {
        if function_excludes.excludes_include(global) {
            tracing::debug!(
                function = %function.name,
                include = %global,
                "global include excluded by function"
            );
            continue;
        }
        if !includes.contains(global) {
            includes.push(global.clone());
        }
    }

    let mut excludes = function.exclude.clone();
    excludes.extend(settings.default_excludes.iter().cloned());
    if let Some(build_root) = build_root_pattern(&settings.project_root, &settings.build_root) {
        excludes.push(build_root);
    }
    excludes.extend(settings.global_excludes.iter().cloned());

    let build_dir = settings.build_root.join(&function.name);
    let own = build_dir.join(&settings.requirements_file);
    let globals = settings.global_requirements.iter().cloned();
    let requirements: Vec<PathBuf> = match settings.requirements_order {
        RequirementsOrder::FunctionFirst => std::iter::once(own).chain(globals).collect(),
        RequirementsOrder::GlobalFirst => globals.chain(std::iter::once(own)).collect(),
    };

    let artifact = match &function.artifact {
        Some(path) => settings.project_root.join(path),
        None => settings.build_root.join(format!("{}.zip", function.name)),
    };

    Ok(EffectiveBuildPlan {
        function: function.name.clone(),
        includes,
        excludes,
        requirements,
        inline_requirements: function.requirements.clone(),
        skip_install: function.skip_install,
        build_dir,
        artifact,
    })
}

/// Anchored pattern for the build root, so an include of `.` never copies
/// earlier build output. `None` when the build root is outside the project.
fn build_root_pattern(project_root: &Path, build_root: &Path) -> Option<String> {
    let relative = build_root
        .strip_prefix(project_root)
        // arch-lint: allow(no-silent-result-drop) reason="a build root outside the project cannot be copied by an include"
        .ok()?;
    let relative = relative.to_str()?.trim_end_matches('/');
    if relative.is_empty() {
        return None;
    }
    Some(format!("/{}/", relative.replace('\\', "/")))
}
