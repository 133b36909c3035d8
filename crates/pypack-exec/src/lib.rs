pub mod container;
pub mod doctor;
pub mod executor;
pub mod installer;
pub mod process;
pub mod stderr;

pub use container::{DockerHost, HostError, HostStatus, Mount, Readiness};
pub use doctor::{CheckResult, DoctorReport, doctor};
pub use executor::{ProcessRunner, RealRunner};
pub use installer::{Decision, ErrorDecider, FixedDecider, InstallError, InstallOutcome, PipInstaller};
pub use process::{ProcessError, ProcessOutput};
pub use stderr::{Site, StderrClass, classify};
