use pypack_core::{GlobalSettings, PackManifest};
use pypack_exec::{CheckResult, RealRunner};
use std::path::Path;

pub async fn doctor(project_dir: &Path) -> anyhow::Result<()> {
    let project_dir = super::project_root(project_dir)?;
    let manifest = PackManifest::load(&project_dir);
    let package = manifest
        .as_ref()
        // arch-lint: allow(no-silent-result-drop) reason="doctor must report diagnostics even when pypack.toml is missing or invalid"
        .ok()
        .and_then(|m| m.package.as_ref());
    let pip_cmd = package.map_or("pip", |p| p.pip_cmd.as_str());
    let use_container = package.is_some_and(|p| p.use_container);

    let mut report = pypack_exec::doctor(&RealRunner, pip_cmd, use_container).await;

    let home = super::home_dir();
    report.manifest = match &manifest {
        Ok(m) => match GlobalSettings::from_manifest(m, &project_dir, home.as_deref()) {
            Ok(settings) => CheckResult::ok(&format!(
                "{} Python function(s), build dir {}",
                m.eligible_functions().count(),
                settings.build_root.display()
            )),
            Err(e) => CheckResult::fail(&e.to_string()),
        },
        Err(e) => CheckResult::fail(&e.to_string()),
    };

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed; see above for details");
    }

    Ok(())
}
