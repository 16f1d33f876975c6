//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! business logic: configuration, logging and runtime wiring.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for planned trials
//! - [`config`] - Configuration loading, logging setup and built-in scenarios

pub mod bootstrap;
pub mod config;
