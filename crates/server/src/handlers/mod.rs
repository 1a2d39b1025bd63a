//! # API Route Handlers
//!
//! This module organizes all the Axum route handlers for `memento-server`,
//! split into sub-modules by functionality.

pub mod catalog;
pub mod chat;
pub mod general;

// Re-export all handlers so the router can reach them under a single `handlers::` path.
pub use catalog::*;
pub use chat::*;
pub use general::*;

// Shared items used by multiple handler modules.
use super::{errors::AppError, state::AppState};
