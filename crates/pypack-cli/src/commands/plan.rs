use pypack_build::PackagingPipeline;
use std::path::Path;

/// Print the resolved build plan of every eligible function as JSON.
pub fn plan(project_dir: &Path) -> anyhow::Result<()> {
    let home = super::home_dir();
    let pipeline = PackagingPipeline::load(&super::project_root(project_dir)?, home.as_deref())?;
    let plans = pipeline.plans()?;
    println!("{}", serde_json::to_string_pretty(&plans)?);
    Ok(())
}
