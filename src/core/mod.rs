//! Core business logic module
//!
//! # Submodules
//!
//! - [`sanitize`] - Identifier sanitization
//! - [`descriptor`] - Project and resource manifest loading
//! - [`artifact`] - Artifact catalog
//! - [`resolver`] - Artifact resolution over ranked sources
//! - [`bridge`] - Runtime bridge acquisition
//! - [`context`] - Build context assembly
//! - [`dockerfile`] - Image build descriptor generation
//! - [`task`] - Build Task
//! - [`builder`] - Build Coordinator
//! - [`batch`] - Batch runs: build, merge, persist, rebuild planning
//! - [`topology`] - Topology state model
//! - [`merge`] - Topology merge
//! - [`project_paths`] - Project-path registry
//! - [`secrets`] - Secret environment values
//! - [`build_config`] - Immutable batch configuration
//! - [`workspace`] - Workspace configuration

pub mod artifact;
pub mod batch;
pub mod bridge;
pub mod build_config;
pub mod builder;
pub mod context;
pub mod descriptor;
pub mod dockerfile;
pub mod merge;
pub mod project_paths;
pub mod resolver;
pub mod sanitize;
pub mod secrets;
pub mod task;
pub mod topology;
pub mod workspace;
