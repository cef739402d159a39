//! `rollcall-core`: the configuration snapshot shared by every other crate.
//!
//! The snapshot is loaded once at startup and then passed around immutably;
//! no component reads the environment after that point.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{ConfigError, Result};
