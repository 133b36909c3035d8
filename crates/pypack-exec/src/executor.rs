use crate::process::{ProcessError, ProcessOutput};

/// Abstraction over subprocess execution for testability.
///
/// Production code uses [`RealRunner`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` to completion, capturing stdout and stderr.
    ///
    /// Only a failure to start the process is an error; the exit status is
    /// reported in [`ProcessOutput::status`].
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput, ProcessError>;
}

/// Real subprocess runner backed by `tokio::process`.
pub struct RealRunner;

impl ProcessRunner for RealRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput, ProcessError> {
        use std::process::Stdio;

        tracing::debug!(program, ?args, "spawning");
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ProcessError::Launch {
                program: program.to_owned(),
                source: e,
            })?;

        Ok(ProcessOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Owned argument vector from string literals.
pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}
