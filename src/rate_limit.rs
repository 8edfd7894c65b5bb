/// Per-client rate limiting for public form submissions and admin login
use crate::{
    config::RateLimitConfig,
    error::{CmsError, CmsResult},
};
use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorLimiter,
};
use std::{net::IpAddr, num::NonZeroU32, sync::Arc, time::Duration};

const LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;

type ClientLimiter = GovernorLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Rate limiter manager, one budget per client address
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    leads: Arc<ClientLimiter>,
    login: Arc<ClientLimiter>,
}

fn per_minute(n: u32, fallback: NonZeroU32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(fallback))
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let ten = NonZeroU32::MIN.saturating_add(9);
        Self {
            enabled: config.enabled,
            leads: Arc::new(GovernorLimiter::keyed(per_minute(
                config.lead_submissions_per_minute,
                ten,
            ))),
            login: Arc::new(GovernorLimiter::keyed(per_minute(
                LOGIN_ATTEMPTS_PER_MINUTE,
                ten,
            ))),
        }
    }

    fn check(&self, limiter: &ClientLimiter, client: IpAddr) -> CmsResult<()> {
        if !self.enabled {
            return Ok(());
        }
        limiter.check_key(&client).map_err(|_| CmsError::RateLimitExceeded {
            retry_after: Duration::from_secs(60),
        })
    }

    /// Check rate limit for a public lead form submission
    pub fn check_lead_submission(&self, client: IpAddr) -> CmsResult<()> {
        self.check(&self.leads, client)
    }

    /// Check rate limit for an admin login attempt
    pub fn check_login(&self, client: IpAddr) -> CmsResult<()> {
        self.check(&self.login, client)
    }

    /// Drop state for clients whose budget has fully refilled
    pub fn prune(&self) -> usize {
        self.leads.retain_recent();
        self.login.retain_recent();
        self.leads.len() + self.login.len()
    }
}
