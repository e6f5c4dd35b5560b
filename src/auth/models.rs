//! Authentication request/response models

use crate::api::validation::{Fields, Schema};
use crate::auth::password::MAX_PASSWORD_BYTES;
use crate::db::models::{PublicUser, Role};
use serde::Serialize;

/// Signup request
#[derive(Debug, Clone, PartialEq)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl Schema for SignupRequest {
    fn parse(fields: &mut Fields<'_>) -> Option<Self> {
        let name = fields.string("name").trim().min_chars(1).max_chars(100).get();
        let email = fields.string("email").max_chars(255).email().get();
        let password = fields
            .string("password")
            .min_chars(1)
            .max_bytes(MAX_PASSWORD_BYTES)
            .get();
        let role = match fields.optional_string("role") {
            Some(rule) => Some(rule.one_of(&["user", "admin"]).get()?),
            None => None,
        };

        Some(Self {
            name: name?.to_string(),
            email: email?.to_string(),
            password: password?.to_string(),
            role: match role {
                Some(role) => role.parse().ok()?,
                None => Role::default(),
            },
        })
    }
}

/// Signin request
#[derive(Debug, Clone, PartialEq)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

impl Schema for SigninRequest {
    fn parse(fields: &mut Fields<'_>) -> Option<Self> {
        let email = fields.string("email").email().get();
        let password = fields.string("password").min_chars(1).get();

        Some(Self {
            email: email?.to_string(),
            password: password?.to_string(),
        })
    }
}

/// Signup response
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

impl From<PublicUser> for SignupResponse {
    fn from(user: PublicUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Signin and session response
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<PublicUser> for SessionUser {
    fn from(user: PublicUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// Generic message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
