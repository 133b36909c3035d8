//! Core types and configuration for pypack.
//!
//! This crate defines the `pypack.toml` schema ([`PackManifest`]), the
//! resolved run settings ([`GlobalSettings`]), function declarations
//! ([`FunctionSpec`]), per-function build plans ([`EffectiveBuildPlan`]),
//! and shared error types.

pub mod config;
pub mod error;
pub mod exclude;
pub mod function;
pub mod plan;

pub use config::{
    ContainerSettings, GlobalSettings, PackManifest, PackageConfig, RequirementsOrder,
    StderrPolicy,
};
pub use error::{Error, Result};
pub use exclude::ExcludeSet;
pub use function::FunctionSpec;
pub use plan::{EffectiveBuildPlan, resolve};
