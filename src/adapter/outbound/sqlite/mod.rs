//! SQLite pool adapter.
//!
//! Drives an r2d2 pool of Diesel SQLite connections. SQLite needs no server,
//! so the backend limits a real database would impose (a connection cap) are
//! emulated by the connection manager.

pub mod connector;
pub mod database;
pub mod pool;

pub use connector::{SqliteConnector, DEFAULT_DATABASE_URL};
pub use pool::SqlitePool;
