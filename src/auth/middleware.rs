//! Session extraction for handlers

use crate::api::handlers::AppState;
use crate::auth::cookie::extract_session_token;
use crate::auth::jwt::{Claims, SessionCodec};
use crate::core::error::WardenError;
use crate::db::models::Role;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Identity of a request carrying a valid session
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Verify the request's session, if it presents one.
///
/// Absent and invalid sessions both come back as `None`; callers that need
/// to tell them apart use the [`AuthUser`] extractor instead.
pub fn optional_session(headers: &HeaderMap, codec: &SessionCodec) -> Option<AuthUser> {
    let token = extract_session_token(headers)?;
    match codec.verify(&token) {
        Ok(claims) => Some(claims.into()),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unusable session token");
            None
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = WardenError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = extract_session_token(&parts.headers).ok_or(WardenError::Unauthenticated)?;
        let claims = state.codec.verify(&token).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            WardenError::Token(e)
        })?;

        Ok(claims.into())
    }
}
