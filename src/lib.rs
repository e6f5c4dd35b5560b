//! Warden account service
//!
//! User signup, signin and listing over SQLite, with bcrypt password
//! hashing, JWT session cookies and a security gate in front of every
//! business route.

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod shield;

// Re-export commonly used types
pub use crate::core::{Config, WardenError};
pub use api::{ApiServer, AppState};
pub use db::DatabaseManager;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
