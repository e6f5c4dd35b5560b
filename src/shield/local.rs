use crate::core::config::ShieldConfig;
use crate::shield::detect::{shield_violation, BotDetector};
use crate::shield::rate_limit::RateLimiter;
use crate::shield::{
    DenialReason, OracleError, RateLimitDecision, RequestProfile, SecurityOracle, Tier,
};
use async_trait::async_trait;

/// Requests allowed per window for each tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub guest: usize,
    pub user: usize,
    pub admin: usize,
}

impl TierLimits {
    pub fn for_tier(&self, tier: Tier) -> usize {
        match tier {
            Tier::Guest => self.guest,
            Tier::User => self.user,
            Tier::Admin => self.admin,
        }
    }
}

/// In-process oracle. Checks run shield, then bot, then rate limit; the
/// first denial wins and denied requests never consume rate budget.
pub struct LocalOracle {
    limiter: RateLimiter,
    limits: TierLimits,
    bots: BotDetector,
}

impl LocalOracle {
    pub fn new(config: &ShieldConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.window_seconds),
            limits: TierLimits {
                guest: config.guest_limit,
                user: config.user_limit,
                admin: config.admin_limit,
            },
            bots: BotDetector::new(&config.allowed_bots, config.block_missing_user_agent),
        }
    }
}

#[async_trait]
impl SecurityOracle for LocalOracle {
    async fn classify(&self, profile: &RequestProfile) -> Result<RateLimitDecision, OracleError> {
        if let Some(rule) = shield_violation(&profile.path_and_query) {
            tracing::debug!(rule, path = %profile.path_and_query, "Shield rule matched");
            return Ok(RateLimitDecision::deny(DenialReason::Shield));
        }

        if self.bots.is_bot(profile.user_agent.as_deref()) {
            return Ok(RateLimitDecision::deny(DenialReason::Bot));
        }

        let limit = self.limits.for_tier(profile.tier);
        match self.limiter.check(&profile.rate_key(), limit).await {
            Ok(()) => Ok(RateLimitDecision::allow()),
            Err(exceeded) => Ok(RateLimitDecision::rate_limited(exceeded.retry_after)),
        }
    }

    async fn prune(&self) {
        self.limiter.cleanup_expired().await;
    }
}
