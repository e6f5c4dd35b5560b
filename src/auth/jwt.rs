//! JWT session token generation and validation

use crate::db::models::{PublicUser, Role};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Why a session token was rejected. Callers outside this module answer
/// every variant the same way.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Identity carried by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl From<&PublicUser> for SessionIdentity {
    fn from(user: &PublicUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Signs and verifies HS256 session tokens with a shared secret
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl SessionCodec {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: chrono::Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Issue a token for the identity, expiring `ttl` from now
    pub fn issue(&self, identity: &SessionIdentity) -> Result<String, TokenError> {
        self.issue_at(identity, chrono::Utc::now(), self.ttl)
    }

    fn issue_at(
        &self,
        identity: &SessionIdentity,
        now: chrono::DateTime<chrono::Utc>,
        ttl: chrono::Duration,
    ) -> Result<String, TokenError> {
        let expiration = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Invalid("Failed to calculate expiration".to_string()))?;

        let claims = Claims {
            id: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Invalid(format!("Failed to generate token: {}", e)))
    }

    /// Validate a token and extract claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
