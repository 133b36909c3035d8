use pypack_build::{PackageReport, PackagingPipeline};
use pypack_exec::{Decision, ErrorDecider, FixedDecider, InstallOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::ARTIFACTS_FILE;
use super::prompt::TerminalDecider;

/// Package every Python function and record the archives for the host.
pub async fn package(project_dir: &Path, assume_yes: bool) -> anyhow::Result<()> {
    let home = super::home_dir();
    let pipeline = PackagingPipeline::load(&super::project_root(project_dir)?, home.as_deref())?;
    let settings = pipeline.settings();

    println!("Packaging functions into {}", settings.build_root.display());
    if let Some(container) = &settings.container {
        println!("Installing dependencies in container '{}' ({})", container.name, container.image);
    }

    let decider: &dyn ErrorDecider = if assume_yes {
        &FixedDecider(Decision::Continue)
    } else {
        &TerminalDecider
    };
    let report = pipeline.package(decider).await?;

    print_report(&report);

    let manifest_path = settings.build_root.join(ARTIFACTS_FILE);
    let artifacts = ArtifactManifest::from_report(&report);
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&artifacts)?)?;
    tracing::debug!(path = %manifest_path.display(), "artifact manifest written");

    if !report.is_success() {
        anyhow::bail!(
            "{} function(s) failed to package; see above for details",
            report.failed.len()
        );
    }

    println!();
    println!("Artifacts recorded in {}", manifest_path.display());
    Ok(())
}

fn print_report(report: &PackageReport) {
    println!();
    for name in &report.skipped {
        println!("  skipped  {name} (not a Python runtime)");
    }
    for artifact in &report.packaged {
        let installed = artifact
            .installs
            .iter()
            .filter(|o| matches!(o, InstallOutcome::Installed { .. }))
            .count();
        println!(
            "  packaged {} -> {} ({} files, {} requirement file(s) installed)",
            artifact.function,
            artifact.archive.display(),
            artifact.files,
            installed
        );
    }
    for failure in &report.failed {
        println!("  FAILED   {}: {}", failure.function, error_chain(&failure.error));
    }
    if report.stopped_early {
        println!("  remaining functions were not packaged");
    }
}

/// `outer: inner: root` for a single line of output.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(e) = source {
        parts.push(e.to_string());
        source = e.source();
    }
    parts.join(": ")
}

/// Contents of `artifacts.json`.
#[derive(Debug, Serialize)]
struct ArtifactManifest<'a> {
    artifacts: BTreeMap<&'a str, &'a Path>,
    failed: Vec<&'a str>,
    skipped: &'a [String],
}

impl<'a> ArtifactManifest<'a> {
    fn from_report(report: &'a PackageReport) -> Self {
        Self {
            artifacts: report.artifacts().collect(),
            failed: report.failed.iter().map(|f| f.function.as_str()).collect(),
            skipped: &report.skipped,
        }
    }
}
