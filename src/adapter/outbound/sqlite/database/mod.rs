//! SQLite database modules.
//!
//! Provides backend connectivity checks, the r2d2 pool builder, and the
//! connection manager that enforces pool limits.

pub mod connection;
pub mod manager;
