//! REST API module
//!
//! This module provides the HTTP server and REST API endpoints including:
//! - API routing and request handling
//! - Request validation
//! - The security gate, trace IDs and security headers
//! - Error handling and response formatting

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod validation;

pub use handlers::AppState;
pub use middleware::{trace_id_middleware, TRACE_ID_HEADER};
pub use server::ApiServer;
