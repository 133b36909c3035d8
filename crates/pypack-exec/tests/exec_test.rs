use mockall::mock;
use pypack_core::{ContainerSettings, StderrPolicy};
use pypack_exec::container::{DockerHost, HostError, HostStatus, Readiness};
use pypack_exec::executor::ProcessRunner;
use pypack_exec::installer::{
    Decision, ErrorDecider, FixedDecider, InstallError, InstallOutcome, PipInstaller,
};
use pypack_exec::process::{ProcessError, ProcessOutput};
use pypack_exec::stderr::StderrClass;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

mock! {
    Runner {}

    impl ProcessRunner for Runner {
        async fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput, ProcessError>;
    }
}

fn ok(stdout: &str) -> Result<ProcessOutput, ProcessError> {
    Ok(ProcessOutput {
        status: Some(0),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    })
}

fn with_stderr(stderr: &str) -> Result<ProcessOutput, ProcessError> {
    Ok(ProcessOutput {
        status: Some(0),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    })
}

fn failed(code: i32, stderr: &str) -> Result<ProcessOutput, ProcessError> {
    Ok(ProcessOutput {
        status: Some(code),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    })
}

fn has(args: &[String], needle: &str) -> bool {
    args.iter().any(|a| a == needle)
}

/// Decider that counts how often it was asked.
struct CountingDecider {
    answer: Decision,
    asked: AtomicUsize,
}

impl CountingDecider {
    fn new(answer: Decision) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ErrorDecider for CountingDecider {
    fn decide(&self, _function: &str, _requirements: &Path, _stderr: &str) -> Decision {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Build dir with a non-empty requirements file.
fn fixture() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let build_dir = tmp.path().join("build/f");
    std::fs::create_dir_all(&build_dir).unwrap();
    let requirements = build_dir.join("requirements.txt");
    std::fs::write(&requirements, "requests==2.31.0\n").unwrap();
    (tmp, build_dir, requirements)
}

fn expect_pip_version(mock: &mut MockRunner, version: &'static str) {
    mock.expect_run()
        .withf(|program, args| program == "pip" && has(args, "--version"))
        .times(1)
        .returning(move |_, _| ok(&format!("pip {version} from /usr/lib/python3/site-packages/pip (python 3.11)\n")));
}

// ── Installer: no-op cases ──

#[tokio::test]
async fn missing_requirements_runs_nothing() {
    let mock = MockRunner::new();
    let tmp = TempDir::new().unwrap();
    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::local(&mock, StderrPolicy::Strict, &decider);

    let outcome = installer
        .install("f", tmp.path(), &tmp.path().join("requirements.txt"))
        .await
        .unwrap();

    assert!(outcome.is_skipped());
}

#[tokio::test]
async fn empty_requirements_runs_nothing() {
    let mock = MockRunner::new();
    let tmp = TempDir::new().unwrap();
    let requirements = tmp.path().join("requirements.txt");
    std::fs::write(&requirements, "").unwrap();
    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::local(&mock, StderrPolicy::Strict, &decider);

    let outcome = installer.install("f", tmp.path(), &requirements).await.unwrap();

    assert_eq!(outcome, InstallOutcome::Skipped { requirements });
}

// ── Installer: command construction ──

#[tokio::test]
async fn install_uses_target_requirements_upgrade_and_conflict_flag() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "23.0.1");

    let expected_dir = build_dir.to_str().unwrap().to_owned();
    let expected_req = requirements.to_str().unwrap().to_owned();
    mock.expect_run()
        .withf(move |program, args| {
            program == "pip"
                && args
                    == [
                        "install",
                        "-t",
                        expected_dir.as_str(),
                        "-r",
                        expected_req.as_str(),
                        "--upgrade",
                        "--no-cache-dir",
                        "--no-warn-conflicts",
                    ]
        })
        .times(1)
        .returning(|_, _| ok("Successfully installed requests\n"));

    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::local(&mock, StderrPolicy::Strict, &decider)
        .pip_args(vec!["--no-cache-dir".to_owned()]);
    let outcome = installer.install("f", &build_dir, &requirements).await.unwrap();

    match outcome {
        InstallOutcome::Installed { class, decision, .. } => {
            assert_eq!(class, StderrClass::Clean);
            assert_eq!(decision, None);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn old_pip_gets_no_conflict_flag() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "9.0.3");
    mock.expect_run()
        .withf(|_, args| has(args, "install") && !has(args, "--no-warn-conflicts"))
        .times(1)
        .returning(|_, _| ok(""));

    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::local(&mock, StderrPolicy::Tolerate, &decider);
    installer.install("f", &build_dir, &requirements).await.unwrap();
}

#[tokio::test]
async fn pip_version_queried_once_per_installer() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "24.0");
    mock.expect_run()
        .withf(|_, args| has(args, "install"))
        .times(2)
        .returning(|_, _| ok(""));

    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::local(&mock, StderrPolicy::Tolerate, &decider);
    installer.install("f", &build_dir, &requirements).await.unwrap();
    installer.install("f", &build_dir, &requirements).await.unwrap();
}

#[tokio::test]
async fn custom_pip_command_used() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|program, args| program == "pip3" && has(args, "--version"))
        .returning(|_, _| ok("pip 23.0 from x (python 3.11)"));
    mock.expect_run()
        .withf(|program, args| program == "pip3" && has(args, "install"))
        .times(1)
        .returning(|_, _| ok(""));

    let decider = FixedDecider(Decision::Abort);
    let installer =
        PipInstaller::local(&mock, StderrPolicy::Tolerate, &decider).pip_cmd("pip3");
    installer.install("f", &build_dir, &requirements).await.unwrap();
}

// ── Installer: stderr policy ──

async fn install_with_stderr(
    stderr: &'static str,
    policy: StderrPolicy,
    decider: &dyn ErrorDecider,
) -> Result<InstallOutcome, InstallError> {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "23.0");
    mock.expect_run()
        .withf(|_, args| has(args, "install"))
        .returning(move |_, _| with_stderr(stderr));

    let installer = PipInstaller::local(&mock, policy, decider);
    installer.install("f", &build_dir, &requirements).await
}

#[tokio::test]
async fn benign_warning_continues_without_prompt() {
    let decider = CountingDecider::new(Decision::Abort);
    let outcome = install_with_stderr("WARNING: foo is deprecated", StderrPolicy::Confirm, &decider)
        .await
        .unwrap();

    assert_eq!(decider.asked(), 0);
    assert!(matches!(
        outcome,
        InstallOutcome::Installed { class: StderrClass::Benign, decision: None, .. }
    ));
}

#[tokio::test]
async fn unrecognized_error_asks_operator_and_continues() {
    let decider = CountingDecider::new(Decision::Continue);
    let outcome = install_with_stderr("ERROR: conflict", StderrPolicy::Confirm, &decider)
        .await
        .unwrap();

    assert_eq!(decider.asked(), 1);
    assert!(matches!(
        outcome,
        InstallOutcome::Installed {
            class: StderrClass::Unrecognized,
            decision: Some(Decision::Continue),
            ..
        }
    ));
}

#[tokio::test]
async fn unrecognized_error_operator_abort() {
    let decider = CountingDecider::new(Decision::Abort);
    let err = install_with_stderr("ERROR: conflict", StderrPolicy::Confirm, &decider)
        .await
        .unwrap_err();

    assert_eq!(decider.asked(), 1);
    assert!(matches!(err, InstallError::Aborted { ref function, .. } if function == "f"));
    assert!(err.stops_run());
}

#[tokio::test]
async fn tolerate_policy_never_prompts() {
    let decider = CountingDecider::new(Decision::Abort);
    let outcome = install_with_stderr("ERROR: conflict", StderrPolicy::Tolerate, &decider)
        .await
        .unwrap();

    assert_eq!(decider.asked(), 0);
    assert!(!outcome.is_skipped());
}

#[tokio::test]
async fn strict_policy_fails_on_any_output() {
    let decider = CountingDecider::new(Decision::Continue);
    let err = install_with_stderr("WARNING: foo is deprecated", StderrPolicy::Strict, &decider)
        .await
        .unwrap_err();

    assert_eq!(decider.asked(), 0);
    assert!(matches!(err, InstallError::Fatal { ref stderr, .. } if stderr.contains("deprecated")));
    assert!(!err.stops_run());
}

#[tokio::test]
async fn local_docker_package_warning_is_benign() {
    let decider = CountingDecider::new(Decision::Abort);
    let outcome = install_with_stderr(
        "WARNING: docker 7.0.0 does not provide the extra 'tls'",
        StderrPolicy::Tolerate,
        &decider,
    )
    .await
    .unwrap();

    assert_eq!(decider.asked(), 0);
    assert!(matches!(
        outcome,
        InstallOutcome::Installed { class: StderrClass::Benign, decision: None, .. }
    ));
}

#[tokio::test]
async fn failed_vcs_checkout_is_never_benign() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "23.0");
    mock.expect_run()
        .withf(|_, args| has(args, "install"))
        .returning(|_, _| {
            failed(
                1,
                "Cloning https://github.com/org/missing to /tmp/x\n\
                 fatal: repository not found\n  \
                 git clone --filter=blob:none https://github.com/org/missing /tmp/x did not run successfully\n",
            )
        });

    let decider = CountingDecider::new(Decision::Abort);
    let installer = PipInstaller::local(&mock, StderrPolicy::Confirm, &decider);
    let err = installer
        .install("f", &build_dir, &requirements)
        .await
        .unwrap_err();

    assert_eq!(decider.asked(), 1);
    assert!(matches!(err, InstallError::Aborted { .. }));
}

#[tokio::test]
async fn warning_with_nonzero_exit_is_unrecognized() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "23.0");
    mock.expect_run()
        .withf(|_, args| has(args, "install"))
        .returning(|_, _| failed(2, "WARNING: Retrying after connection broken\n"));

    let decider = CountingDecider::new(Decision::Continue);
    let installer = PipInstaller::local(&mock, StderrPolicy::Tolerate, &decider);
    let outcome = installer.install("f", &build_dir, &requirements).await.unwrap();

    assert_eq!(decider.asked(), 0);
    assert!(matches!(
        outcome,
        InstallOutcome::Installed { class: StderrClass::Unrecognized, .. }
    ));
}

#[tokio::test]
async fn silent_nonzero_exit_treated_as_unrecognized() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    expect_pip_version(&mut mock, "23.0");
    mock.expect_run()
        .withf(|_, args| has(args, "install"))
        .returning(|_, _| failed(1, ""));

    let decider = FixedDecider(Decision::Continue);
    let installer = PipInstaller::local(&mock, StderrPolicy::Strict, &decider);
    let err = installer
        .install("f", &build_dir, &requirements)
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Fatal { ref stderr, .. } if stderr.contains("exit code 1")));
}

#[tokio::test]
async fn pip_not_installed_is_launch_error() {
    let (_tmp, build_dir, requirements) = fixture();
    let mut mock = MockRunner::new();
    mock.expect_run().returning(|program, _| {
        Err(ProcessError::Launch {
            program: program.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    });

    let decider = FixedDecider(Decision::Continue);
    let installer = PipInstaller::local(&mock, StderrPolicy::Tolerate, &decider);
    let err = installer
        .install("f", &build_dir, &requirements)
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Launch { .. }));
    assert!(err.stops_run());
}

// ── Docker host ──

fn container_settings(credentials: Option<&str>) -> ContainerSettings {
    ContainerSettings {
        image: "lambci/lambda:build-python3.9".to_owned(),
        name: "pypack-builder".to_owned(),
        mount_path: "/var/task".to_owned(),
        credentials_dir: credentials.map(PathBuf::from),
    }
}

fn expect_ps(mock: &mut MockRunner, stdout: &'static str) {
    mock.expect_run()
        .withf(|program, args| program == "docker" && has(args, "ps"))
        .times(1)
        .returning(move |_, _| ok(stdout));
}

fn expect_mounts(mock: &mut MockRunner, project: &'static str) {
    mock.expect_run()
        .withf(|program, args| program == "docker" && has(args, "inspect"))
        .times(1)
        .returning(move |_, _| ok(&format!("{project}\t/var/task\n")));
}

#[tokio::test]
async fn status_parses_container_state() {
    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|_, args| has(args, "ps"))
        .returning(|_, _| ok("other\trunning\npypack-builder\texited\n"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.status().await.unwrap(), HostStatus::Stopped);
}

#[tokio::test]
async fn ensure_ready_creates_absent_container() {
    let mut mock = MockRunner::new();
    expect_ps(&mut mock, "");
    mock.expect_run()
        .withf(|_, args| has(args, "images"))
        .times(1)
        .returning(|_, _| ok("sha256:abc\n"));
    mock.expect_run()
        .withf(|_, args| {
            args == [
                "run",
                "-d",
                "--name",
                "pypack-builder",
                "-v",
                "/proj:/var/task",
                "-v",
                "/home/dev/.ssh:/root/.ssh:ro",
                "lambci/lambda:build-python3.9",
                "tail",
                "-f",
                "/dev/null",
            ]
        })
        .times(1)
        .returning(|_, _| ok("0123456789ab\n"));

    let host = DockerHost::with_runner(
        mock,
        container_settings(Some("/home/dev/.ssh")),
        Path::new("/proj"),
    );
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Created);
}

#[tokio::test]
async fn ensure_ready_pulls_missing_image() {
    let mut mock = MockRunner::new();
    expect_ps(&mut mock, "");
    mock.expect_run()
        .withf(|_, args| has(args, "images"))
        .returning(|_, _| ok("\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "pull") && has(args, "lambci/lambda:build-python3.9"))
        .times(1)
        .returning(|_, _| ok("Status: Downloaded newer image\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "run"))
        .times(1)
        .returning(|_, _| ok("id\n"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Created);
}

#[tokio::test]
async fn ensure_ready_twice_creates_once_then_reuses() {
    let mut mock = MockRunner::new();
    let ps_calls = AtomicUsize::new(0);
    mock.expect_run()
        .withf(|_, args| has(args, "ps"))
        .times(2)
        .returning(move |_, _| {
            if ps_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ok("")
            } else {
                ok("pypack-builder\trunning\n")
            }
        });
    mock.expect_run()
        .withf(|_, args| has(args, "images"))
        .times(1)
        .returning(|_, _| ok("sha256:abc\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "run"))
        .times(1)
        .returning(|_, _| ok("id\n"));
    expect_mounts(&mut mock, "/proj");

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Created);
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Reused);
}

#[tokio::test]
async fn ensure_ready_restarts_stopped_container() {
    let mut mock = MockRunner::new();
    expect_ps(&mut mock, "pypack-builder\texited\n");
    expect_mounts(&mut mock, "/proj");
    mock.expect_run()
        .withf(|_, args| args == ["start", "pypack-builder"])
        .times(1)
        .returning(|_, _| ok("pypack-builder\n"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Restarted);
}

#[tokio::test]
async fn ensure_ready_recreates_when_restart_fails() {
    let mut mock = MockRunner::new();
    expect_ps(&mut mock, "pypack-builder\tcreated\n");
    expect_mounts(&mut mock, "/proj");
    mock.expect_run()
        .withf(|_, args| has(args, "start"))
        .times(1)
        .returning(|_, _| failed(1, "Error: mount source path does not exist"));
    mock.expect_run()
        .withf(|_, args| args == ["rm", "-f", "pypack-builder"])
        .times(1)
        .returning(|_, _| ok("pypack-builder\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "run"))
        .times(1)
        .returning(|_, _| ok("id\n"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Recreated);
}

#[tokio::test]
async fn ensure_ready_replaces_container_of_another_project() {
    let mut mock = MockRunner::new();
    expect_ps(&mut mock, "pypack-builder\trunning\n");
    expect_mounts(&mut mock, "/elsewhere/other-project");
    mock.expect_run()
        .withf(|_, args| args == ["rm", "-f", "pypack-builder"])
        .times(1)
        .returning(|_, _| ok("pypack-builder\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "images"))
        .times(1)
        .returning(|_, _| ok("sha256:abc\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "run") && has(args, "/proj:/var/task"))
        .times(1)
        .returning(|_, _| ok("id\n"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Recreated);
}

#[tokio::test]
async fn ensure_ready_replaces_container_without_project_mount() {
    let mut mock = MockRunner::new();
    expect_ps(&mut mock, "pypack-builder\texited\n");
    mock.expect_run()
        .withf(|_, args| has(args, "inspect"))
        .times(1)
        .returning(|_, _| ok(""));
    mock.expect_run()
        .withf(|_, args| args == ["rm", "-f", "pypack-builder"])
        .times(1)
        .returning(|_, _| ok("pypack-builder\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "images"))
        .returning(|_, _| ok("sha256:abc\n"));
    mock.expect_run()
        .withf(|_, args| has(args, "run"))
        .times(1)
        .returning(|_, _| ok("id\n"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert_eq!(host.ensure_ready().await.unwrap(), Readiness::Recreated);
}

#[tokio::test]
async fn ensure_ready_reports_missing_docker() {
    let mut mock = MockRunner::new();
    mock.expect_run().returning(|program, _| {
        Err(ProcessError::Launch {
            program: program.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    });

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    assert!(matches!(
        host.ensure_ready().await,
        Err(HostError::Launch { .. })
    ));
}

#[tokio::test]
async fn teardown_tolerates_failures() {
    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|_, args| has(args, "stop"))
        .times(1)
        .returning(|_, _| failed(1, "No such container: pypack-builder"));
    mock.expect_run()
        .withf(|_, args| args == ["rm", "pypack-builder"])
        .times(1)
        .returning(|_, _| failed(1, "No such container: pypack-builder"));

    let host = DockerHost::with_runner(mock, container_settings(None), Path::new("/proj"));
    host.teardown().await;
}

#[tokio::test]
async fn container_install_runs_through_docker_exec() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let build_dir = root.join("build/f");
    std::fs::create_dir_all(&build_dir).unwrap();
    let requirements = build_dir.join("requirements.txt");
    std::fs::write(&requirements, "requests\n").unwrap();

    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|program, args| {
            program == "docker" && args == ["exec", "pypack-builder", "pip", "--version"]
        })
        .times(1)
        .returning(|_, _| ok("pip 23.0.1 from /var/lang/lib/python3.9 (python 3.9)\n"));
    mock.expect_run()
        .withf(|program, args| {
            program == "docker"
                && args
                    == [
                        "exec",
                        "pypack-builder",
                        "pip",
                        "install",
                        "-t",
                        "/var/task/build/f",
                        "-r",
                        "/var/task/build/f/requirements.txt",
                        "--upgrade",
                        "--no-warn-conflicts",
                    ]
        })
        .times(1)
        .returning(|_, _| ok(""));

    let host = DockerHost::with_runner(mock, container_settings(None), &root);
    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::in_container(&host, StderrPolicy::Strict, &decider);
    let outcome = installer.install("f", &build_dir, &requirements).await.unwrap();
    assert!(!outcome.is_skipped());
}

/// Container installer whose `docker exec pip install` fails with `code`.
async fn container_install_failing(
    code: i32,
    stderr: &'static str,
    decider: &dyn ErrorDecider,
) -> Result<InstallOutcome, InstallError> {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let build_dir = root.join("build/f");
    std::fs::create_dir_all(&build_dir).unwrap();
    let requirements = build_dir.join("requirements.txt");
    std::fs::write(&requirements, "requests\n").unwrap();

    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|program, args| program == "docker" && has(args, "--version"))
        .returning(|_, _| ok("pip 23.0.1 from /var/lang/lib/python3.9 (python 3.9)\n"));
    mock.expect_run()
        .withf(|program, args| program == "docker" && has(args, "install"))
        .returning(move |_, _| failed(code, stderr));

    let host = DockerHost::with_runner(mock, container_settings(None), &root);
    let installer = PipInstaller::in_container(&host, StderrPolicy::Tolerate, decider);
    installer.install("f", &build_dir, &requirements).await
}

#[tokio::test]
async fn container_daemon_error_is_infrastructure_error() {
    let decider = CountingDecider::new(Decision::Continue);
    let err = container_install_failing(
        1,
        "Error response from daemon: Container 3f2a9c is not running\n",
        &decider,
    )
    .await
    .unwrap_err();

    assert_eq!(decider.asked(), 0);
    assert!(matches!(err, InstallError::Infrastructure { .. }));
    assert!(err.stops_run());
}

#[tokio::test]
async fn container_exec_exit_codes_are_infrastructure_errors() {
    for code in [125, 126, 127] {
        let decider = CountingDecider::new(Decision::Continue);
        let err = container_install_failing(code, "", &decider).await.unwrap_err();

        assert_eq!(decider.asked(), 0, "exit {code}");
        assert!(
            matches!(err, InstallError::Infrastructure { ref stderr } if stderr.contains(&format!("exit code {code}"))),
            "exit {code}: {err:?}"
        );
    }
}

#[tokio::test]
async fn container_pip_failure_is_not_infrastructure() {
    let decider = CountingDecider::new(Decision::Continue);
    let outcome = container_install_failing(
        1,
        "ERROR: No matching distribution found for nope\n",
        &decider,
    )
    .await
    .unwrap();

    assert_eq!(decider.asked(), 0);
    assert!(matches!(
        outcome,
        InstallOutcome::Installed { class: StderrClass::Unrecognized, .. }
    ));
}

#[tokio::test]
async fn container_install_rejects_paths_outside_project() {
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let requirements = elsewhere.path().join("requirements.txt");
    std::fs::write(&requirements, "requests\n").unwrap();

    let mock = MockRunner::new();
    let host = DockerHost::with_runner(mock, container_settings(None), project.path());
    let decider = FixedDecider(Decision::Abort);
    let installer = PipInstaller::in_container(&host, StderrPolicy::Strict, &decider);
    let err = installer
        .install("f", &project.path().join("build/f"), &requirements)
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::OutsideMount { .. }));
}

// ── Doctor ──

#[tokio::test]
async fn doctor_reports_local_pip_version() {
    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|program, args| program == "pip3" && args == ["--version"])
        .times(1)
        .returning(|_, _| ok("pip 23.0.1 from /usr/lib/python3/dist-packages/pip (python 3.11)\n"));

    let report = pypack_exec::doctor(&mock, "pip3", false).await;

    assert!(report.pip.passed);
    assert_eq!(report.pip.detail, "pip 23.0.1");
    assert!(report.docker.passed, "docker is not needed locally");
}

#[tokio::test]
async fn doctor_flags_missing_docker_in_container_mode() {
    let mut mock = MockRunner::new();
    mock.expect_run()
        .withf(|program, _| program == "docker")
        .times(1)
        .returning(|program, _| {
            Err(ProcessError::Launch {
                program: program.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        });

    let mut report = pypack_exec::doctor(&mock, "pip", true).await;
    report.manifest = pypack_exec::CheckResult::ok("Found");

    assert!(!report.docker.passed);
    assert!(report.pip.passed);
    assert!(!report.all_passed());
    assert!(report.to_string().contains("NG"));
}
