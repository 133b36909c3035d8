use std::fmt;

use crate::executor::{ProcessRunner, args};

/// Check pip and, when the builder container is used, docker.
pub async fn doctor<R: ProcessRunner>(runner: &R, pip_cmd: &str, use_container: bool) -> DoctorReport {
    let mut report = DoctorReport::default();

    report.pip = if use_container {
        CheckResult::skipped("runs inside the builder container")
    } else {
        run_check(runner, pip_cmd, &args(["--version"]), |out| {
            // "pip 23.0.1 from /usr/lib/python3/dist-packages/pip (python 3.11)"
            out.split(" from ").next().unwrap_or(out).trim().to_owned()
        })
        .await
    };

    report.docker = if use_container {
        run_check(
            runner,
            "docker",
            &args(["version", "--format", "{{.Server.Version}}"]),
            |out| format!("server {}", out.trim()),
        )
        .await
    } else {
        CheckResult::skipped("use_container is off")
    };

    report
}

async fn run_check<R: ProcessRunner>(
    runner: &R,
    program: &str,
    cmd: &[String],
    describe: impl FnOnce(&str) -> String,
) -> CheckResult {
    match runner.run(program, cmd).await {
        Ok(output) if output.success() => CheckResult::ok(&describe(&output.stdout)),
        Ok(output) => CheckResult::fail(output.stderr.trim()),
        Err(e) => CheckResult::fail(&e.to_string()),
    }
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub pip: CheckResult,
    pub docker: CheckResult,
    pub manifest: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.pip.passed && self.docker.passed && self.manifest.passed
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pypack doctor")?;
        writeln!(f, "------------------------------")?;
        for (label, check) in [
            ("pip", &self.pip),
            ("docker", &self.docker),
            ("pypack.toml", &self.manifest),
        ] {
            writeln!(f, "{label:<14}{:<4}{}", check.icon(), check.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    /// Not applicable in this configuration; counts as passed.
    pub fn skipped(reason: &str) -> Self {
        Self {
            passed: true,
            detail: format!("skipped ({reason})"),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}
