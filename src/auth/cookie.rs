//! Session cookie construction and extraction

use crate::core::config::{AppEnvironment, SecurityConfig};
use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "token";

/// Attributes of the session cookie
#[derive(Debug, Clone)]
pub struct CookieSettings {
    max_age: u64,
    secure: bool,
}

impl CookieSettings {
    pub fn new(max_age: u64, secure: bool) -> Self {
        Self { max_age, secure }
    }

    /// Cookies are only marked `Secure` in production
    pub fn from_config(security: &SecurityConfig, environment: AppEnvironment) -> Self {
        Self::new(security.cookie_max_age, environment.is_production())
    }

    /// `Set-Cookie` value carrying a session token
    pub fn session_cookie(&self, token: &str) -> HeaderValue {
        self.build(token, self.max_age)
    }

    /// `Set-Cookie` value that expires the session cookie
    pub fn clear_cookie(&self) -> HeaderValue {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: u64) -> HeaderValue {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age}"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        // Tokens are base64url and dots, always a valid header value
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| {
            HeaderValue::from_static("token=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
        })
    }
}

/// Session token from the `token` cookie, falling back to a bearer header
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie_token(headers).or_else(|| extract_bearer_token(headers))
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
                .then(|| val.trim().to_string())
        })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
