//! Application services (use cases).
//!
//! These services drive a pool through the [`PoolHandle`] port and never
//! name a concrete backend.
//!
//! [`PoolHandle`]: crate::port::outbound::pool::PoolHandle

pub mod harness;
pub mod observer;
pub mod runner;
pub mod worker;

pub use harness::{Harness, HarnessEvent, PlannedTrial};
pub use observer::{ObserverOutcome, PoolObserver, DEFAULT_POLL_INTERVAL};
pub use runner::SimulationRunner;
pub use worker::WorkerGroup;
