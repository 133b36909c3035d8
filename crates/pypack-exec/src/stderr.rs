//! Classification of installer stderr output.
//!
//! pip writes plenty of non-fatal text to stderr: deprecation notices,
//! upgrade hints, and git progress when installing from VCS URLs. Only
//! output that is not recognised as benign needs a policy decision.

/// Lines that start with one of these are advisory only.
const ADVISORY_PREFIXES: &[&str] = &["WARNING", "DEPRECATION", "[notice]", "Warning:"];

/// Progress written by a VCS checkout during `pip install git+...`.
const VCS_PROGRESS_MARKERS: &[&str] = &["Cloning ", "Running command git", "git clone"];

/// Markers that turn otherwise advisory output into an error report.
const ERROR_MARKERS: &[&str] = &["ERROR", "Traceback", "error:"];

/// Written by the docker client or daemon when `docker exec` itself fails.
const DAEMON_MARKERS: &[&str] = &[
    "Error response from daemon",
    "No such container",
    "Cannot connect to the Docker daemon",
    "OCI runtime exec failed",
];

/// Where the installer ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Local,
    /// Through `docker exec` in the builder container
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrClass {
    /// No stderr output.
    Clean,
    /// Warnings or VCS progress only.
    Benign,
    /// The container subsystem failed; never recoverable mid-run.
    Infrastructure,
    /// Anything else. Resolved by the configured stderr policy.
    Unrecognized,
}

/// Classify installer stderr.
///
/// Container failures are only recognised for [`Site::Container`]; locally a
/// mention of docker is just pip talking about a package.
///
/// # Examples
///
/// ```
/// use pypack_exec::stderr::{Site, StderrClass, classify};
///
/// assert_eq!(classify("", Site::Local), StderrClass::Clean);
/// assert_eq!(classify("WARNING: foo is deprecated", Site::Local), StderrClass::Benign);
/// assert_eq!(classify("ERROR: conflict", Site::Local), StderrClass::Unrecognized);
/// assert_eq!(
///     classify("Error response from daemon: Container 3f2a is not running", Site::Container),
///     StderrClass::Infrastructure
/// );
/// ```
pub fn classify(stderr: &str, site: Site) -> StderrClass {
    if stderr.trim().is_empty() {
        return StderrClass::Clean;
    }
    if site == Site::Container && is_container_failure(stderr) {
        return StderrClass::Infrastructure;
    }

    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines
        .iter()
        .all(|l| VCS_PROGRESS_MARKERS.iter().any(|m| l.contains(m)))
    {
        return StderrClass::Benign;
    }

    let has_error = ERROR_MARKERS.iter().any(|m| stderr.contains(m));
    let advisory = lines.first().is_some_and(|first| {
        ADVISORY_PREFIXES.iter().any(|p| first.starts_with(p))
            || VCS_PROGRESS_MARKERS.iter().any(|m| first.contains(m))
    });
    if advisory && !has_error {
        return StderrClass::Benign;
    }

    StderrClass::Unrecognized
}

fn is_container_failure(stderr: &str) -> bool {
    DAEMON_MARKERS.iter().any(|m| stderr.contains(m))
        || stderr.to_ascii_lowercase().contains("docker")
}
