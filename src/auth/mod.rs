//! Authentication module
//!
//! This module provides authentication functionality including:
//! - User signup and signin
//! - JWT session tokens carried in an HttpOnly cookie
//! - Password hashing and verification
//! - Session extraction for handlers

pub mod cookie;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use cookie::CookieSettings;
pub use handlers::{me, signin, signout, signup};
pub use jwt::{Claims, SessionCodec, SessionIdentity, TokenError};
pub use middleware::AuthUser;
pub use password::CredentialHasher;
pub use service::{Authenticator, SignedIn};
