//! Configuration and constants
//!
//! - [`defaults`] - Built-in ports, limits, and runtime defaults
//! - [`urls`] - Upstream registry and release feed endpoints

pub mod defaults;
pub mod urls;
