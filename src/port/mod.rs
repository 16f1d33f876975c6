//! Port definitions.
//!
//! `outbound` holds the contracts the harness consumes from the pool it
//! drives.

pub mod outbound;
