//! Build directory assembly, archiving, and the packaging pipeline for pypack.
//!
//! # Packaging pipeline
//!
//! ```text
//! pypack package
//!   1. Config       ── pypack.toml → GlobalSettings (fatal if build_dir missing)
//!   2. Build root   ── create <build_dir>/
//!   3. Container    ── DockerHost::ensure_ready() (use_container only)
//!   4. Per function ── resolve() → PackageAssembler::assemble()
//!        a. recreate <build_dir>/<name>/
//!        b. copy includes minus excludes
//!        c. write inline requirements
//!        d. pip install each requirements file
//!        e. zip → <build_dir>/<name>.zip
//!
//! pypack cleanup
//!   remove <build_dir>/, stop + remove the builder container
//! ```
//!
//! Functions run strictly one after another and share the builder container.

pub mod archive;
pub mod assemble;
pub mod pipeline;

pub use assemble::{AssembleError, PackageArtifact, PackageAssembler};
pub use pipeline::{CleanupReport, FunctionFailure, PackageReport, PackagingPipeline, PipelineError};
