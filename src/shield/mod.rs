//! Security gate
//!
//! Every inbound request is summarised into a [`RequestProfile`] and handed to
//! a [`SecurityOracle`], which decides whether the request may proceed. The
//! HTTP side of the gate lives in `api::middleware::shield`; this module only
//! knows about profiles and decisions.
//!
//! [`LocalOracle`] is the in-process implementation: attack-pattern shield,
//! user-agent bot heuristics and a per-tier sliding-window rate limit.

pub mod detect;
pub mod local;
pub mod rate_limit;

pub use local::LocalOracle;
pub use rate_limit::RateLimiter;

use crate::db::models::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Rate-limit tier a request is counted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Guest,
    User,
    Admin,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Guest => "guest",
            Tier::User => "user",
            Tier::Admin => "admin",
        }
    }
}

impl From<Option<Role>> for Tier {
    fn from(role: Option<Role>) -> Self {
        match role {
            None => Tier::Guest,
            Some(Role::User) => Tier::User,
            Some(Role::Admin) => Tier::Admin,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the gate knows about a request
#[derive(Debug, Clone)]
pub struct RequestProfile {
    pub client_ip: IpAddr,
    /// User id from a valid session; `None` for guests
    pub identity: Option<String>,
    pub tier: Tier,
    pub user_agent: Option<String>,
    pub method: String,
    pub path_and_query: String,
}

impl RequestProfile {
    /// Key the request is counted under: `guest:<ip>` or `<tier>:<user id>`
    pub fn rate_key(&self) -> String {
        match &self.identity {
            Some(id) if self.tier != Tier::Guest => format!("{}:{}", self.tier, id),
            _ => format!("guest:{}", self.client_ip),
        }
    }
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenialReason {
    Bot,
    Shield,
    RateLimit,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::Bot => "bot",
            DenialReason::Shield => "shield",
            DenialReason::RateLimit => "rate-limit",
        }
    }

    /// Client-facing explanation
    pub fn message(self) -> &'static str {
        match self {
            DenialReason::Bot => "Automated clients are not allowed",
            DenialReason::Shield => "Request blocked by security policy",
            DenialReason::RateLimit => "Too many requests",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
    /// Seconds until a rate-limited client may retry
    pub retry_after: Option<u64>,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            retry_after: None,
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::deny(DenialReason::RateLimit)
        }
    }
}

/// The oracle could not reach a verdict
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle timed out")]
    Timeout,
}

/// Classifies requests ahead of business logic
#[async_trait]
pub trait SecurityOracle: Send + Sync {
    async fn classify(&self, profile: &RequestProfile) -> Result<RateLimitDecision, OracleError>;

    /// Drop state that no longer affects decisions
    async fn prune(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn profile(identity: Option<&str>, tier: Tier) -> RequestProfile {
        RequestProfile {
            client_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            identity: identity.map(str::to_string),
            tier,
            user_agent: Some("curl/8.0".to_string()),
            method: "GET".to_string(),
            path_and_query: "/users".to_string(),
        }
    }

    #[test]
    fn test_rate_keys() {
        assert_eq!(profile(None, Tier::Guest).rate_key(), "guest:10.0.0.7");
        assert_eq!(profile(Some("u1"), Tier::User).rate_key(), "user:u1");
        assert_eq!(profile(Some("u2"), Tier::Admin).rate_key(), "admin:u2");
    }

    #[test]
    fn test_tier_from_role() {
        assert_eq!(Tier::from(None), Tier::Guest);
        assert_eq!(Tier::from(Some(Role::User)), Tier::User);
        assert_eq!(Tier::from(Some(Role::Admin)), Tier::Admin);
    }

    #[test]
    fn test_reason_wire_names() {
        assert_eq!(
            serde_json::to_value(DenialReason::RateLimit).unwrap(),
            serde_json::json!("rate-limit")
        );
        assert_eq!(DenialReason::Bot.to_string(), "bot");
        assert_eq!(DenialReason::Shield.to_string(), "shield");
    }

    #[test]
    fn test_rate_limited_decision() {
        let decision = RateLimitDecision::rate_limited(12);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::RateLimit));
        assert_eq!(decision.retry_after, Some(12));
    }
}
