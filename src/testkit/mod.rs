//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`pool`]: in-process pool and connector doubles.
//! - [`config`]: canonical pool configs and trial parameters.

pub mod config;
pub mod pool;
