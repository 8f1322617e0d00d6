//! Basil compiler version information.
//!
//! This module exposes the compiler version as a single constant so every
//! consumer agrees on the same value.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer this constant over repeating `env!("CARGO_PKG_VERSION")` in multiple places.

/// The Basil compiler version string (for example, `0.3.1`).
pub const BASIL_VERSION: &str = env!("CARGO_PKG_VERSION");
