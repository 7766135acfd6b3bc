//! Plugin registry and release feed clients
//!
//! Handles querying version listings and release feeds for downloadable
//! artifacts. Selection of a concrete file is pure and lives in [`models`].

pub mod client;
pub mod models;

pub use client::RegistryClient;
