use pypack_build::PackagingPipeline;
use std::path::Path;

/// Remove the build directory and stop the builder container.
pub async fn cleanup(project_dir: &Path) -> anyhow::Result<()> {
    let home = super::home_dir();
    let pipeline = PackagingPipeline::load(&super::project_root(project_dir)?, home.as_deref())?;

    let Some(report) = pipeline.cleanup().await else {
        println!("Cleanup disabled in pypack.toml; nothing removed.");
        return Ok(());
    };

    if report.removed_build_root {
        println!("Removed {}", report.build_root.display());
    } else {
        println!("Could not remove {} (see log)", report.build_root.display());
    }
    if report.stopped_container {
        println!("Builder container stopped.");
    }
    Ok(())
}
