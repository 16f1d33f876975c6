//! Infrastructure configuration modules.

pub mod logging;
pub mod scenarios;
pub mod settings;
