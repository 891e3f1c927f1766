//! Wayfarer API crate - axum HTTP transport for the dialogue engine.
//!
//! Exposes session management and turn handling as JSON endpoints, plus
//! a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, serve};
pub use state::AppState;
