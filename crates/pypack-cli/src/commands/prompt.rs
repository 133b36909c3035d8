use pypack_exec::{Decision, ErrorDecider};
use std::io::{BufRead, Write};
use std::path::Path;

/// Asks on the terminal whether to keep going after installer errors.
///
/// Anything but an explicit yes aborts, including a closed stdin.
pub(crate) struct TerminalDecider;

impl ErrorDecider for TerminalDecider {
    fn decide(&self, function: &str, requirements: &Path, stderr: &str) -> Decision {
        println!();
        println!("pip reported errors for '{function}' ({}):", requirements.display());
        for line in stderr.lines() {
            println!("  {line}");
        }
        println!();
        print!("Continue packaging? [y/N] ");
        if let Err(e) = std::io::stdout().flush() {
            tracing::warn!(error = %e, "failed to flush prompt");
        }

        without_stalling_runtime(|| read_answer(&mut std::io::stdin().lock()))
    }
}

/// Blocking reads leave the async worker first when the runtime allows it.
fn without_stalling_runtime<T>(read: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

fn read_answer(reader: &mut impl BufRead) -> Decision {
    let mut input = String::new();
    match reader.read_line(&mut input) {
        Ok(_) => parse_answer(&input),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read answer; aborting");
            Decision::Abort
        }
    }
}

fn parse_answer(input: &str) -> Decision {
    if matches!(input.trim(), "y" | "Y" | "yes" | "YES") {
        Decision::Continue
    } else {
        Decision::Abort
    }
}
