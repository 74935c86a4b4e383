//! Rate Limiter
//!
//! Per-client, per-action attempt ceilings on top of a
//! [`RateLimitStore`]. Keys are `"{action}:{ip}"`.

use std::net::IpAddr;
use std::sync::Arc;

use platform::rate_limit::RateLimitStore;

use crate::application::config::{AccessConfig, ProtectedAction};

pub struct RateLimiter<L>
where
    L: RateLimitStore,
{
    store: Arc<L>,
    config: Arc<AccessConfig>,
}

impl<L> RateLimiter<L>
where
    L: RateLimitStore,
{
    pub fn new(store: Arc<L>, config: Arc<AccessConfig>) -> Self {
        Self { store, config }
    }

    /// Count one attempt and report whether it is within the ceiling.
    ///
    /// A store failure lets the request through.
    pub async fn allow(&self, ip: IpAddr, action: ProtectedAction) -> bool {
        let Some(limit) = self.config.rate_limit_for(action) else {
            return true;
        };
        let key = rate_limit_key(ip, action);

        match self.store.check_and_increment(&key, limit).await {
            Ok(result) => {
                if !result.allowed {
                    tracing::warn!(
                        client_ip = %ip,
                        action = action.as_str(),
                        reset_at_ms = result.reset_at_ms,
                        "Rate limit exceeded"
                    );
                }
                result.allowed
            }
            Err(e) => {
                tracing::warn!(error = %e, action = action.as_str(), "Rate limit store failed, allowing request");
                true
            }
        }
    }

    /// Drop closed windows; failures are logged and count as zero
    pub async fn purge_expired(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(purged) => purged,
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit purge failed");
                0
            }
        }
    }
}

fn rate_limit_key(ip: IpAddr, action: ProtectedAction) -> String {
    format!("{}:{}", action.as_str(), ip.to_canonical())
}
