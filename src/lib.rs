//! Gamestack - parallel game-server image builder
//!
//! This library builds game projects into container images concurrently
//! and merges the results into a single multi-service topology file,
//! leaving hand-maintained infrastructure entries untouched.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic: descriptors, build tasks, topology merge
//! - [`registry`] - Package registry and release feed clients
//! - [`infra`] - Infrastructure layer (network, filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
pub mod registry;

#[cfg(test)]
pub mod test_utils;
