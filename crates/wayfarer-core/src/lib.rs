//! Shared domain types, configuration and errors for Wayfarer.

pub mod config;
pub mod error;
pub mod types;

pub use config::WayfarerConfig;
pub use error::{Result, WayfarerError};
pub use types::*;
