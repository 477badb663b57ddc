//! # airouter_core
//!
//! Core domain logic for airouter: session tokens, identity lookup,
//! upstream provider adapters and platform routing.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod providers;
pub mod strategy;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
