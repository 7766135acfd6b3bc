//! Infrastructure layer
//!
//! Handles all I/O with the outside world: network, filesystem, and the
//! external build and container tools.

pub mod dirs;
pub mod docker;
pub mod download;
pub mod filesystem;
pub mod gradle;
