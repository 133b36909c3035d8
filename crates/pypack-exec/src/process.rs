/// Captured result of a finished subprocess.
///
/// A non-zero exit status is not an error at this level; callers decide
/// what a failure means for their command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Convert into stdout, failing on a non-zero exit status.
    pub fn into_stdout(self, program: &str, args: &[String]) -> Result<String, ProcessError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(ProcessError::CommandFailed {
                command: render_command(program, args),
                status: self.status,
                stderr: self.stderr,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start `{program}` — is it installed and on PATH?")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("command failed ({}): {command}\n{stderr}", format_status(*status))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

pub(crate) fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn format_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_owned(),
    }
}
