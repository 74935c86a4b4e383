//! Request Guard
//!
//! The checks every state-changing request passes first: an action-scoped
//! CSRF proof, then the per-client rate limit. A rejected proof consumes no
//! rate-limit budget.

use platform::client::ClientContext;
use platform::clock::Clock;
use platform::csrf::CsrfGuard;
use platform::rate_limit::RateLimitStore;
use serde_json::json;
use std::sync::Arc;

use crate::application::analytics::AuditLog;
use crate::application::config::{AccessConfig, ProtectedAction};
use crate::application::rate_limiter::RateLimiter;
use crate::domain::entity::analytics_event::{AnalyticsEvent, EventType};
use crate::domain::repository::AnalyticsRepository;
use crate::error::{AccessError, AccessResult};

pub struct RequestGuard<L, A>
where
    L: RateLimitStore,
    A: AnalyticsRepository,
{
    csrf: Arc<CsrfGuard>,
    limiter: RateLimiter<L>,
    audit: AuditLog<A>,
    clock: Arc<dyn Clock>,
}

impl<L, A> RequestGuard<L, A>
where
    L: RateLimitStore,
    A: AnalyticsRepository,
{
    pub fn new(
        csrf: Arc<CsrfGuard>,
        limit_store: Arc<L>,
        audit: AuditLog<A>,
        clock: Arc<dyn Clock>,
        config: Arc<AccessConfig>,
    ) -> Self {
        Self {
            csrf,
            limiter: RateLimiter::new(limit_store, config),
            audit,
            clock,
        }
    }

    pub async fn check(
        &self,
        action: ProtectedAction,
        csrf_token: Option<&str>,
        client: &ClientContext,
    ) -> AccessResult<()> {
        if let Err(e) = self.csrf.verify(action.as_str(), csrf_token) {
            self.record_denial(EventType::CsrfRejected, action, client, &e.to_string())
                .await;
            return Err(e.into());
        }

        if !self.limiter.allow(client.ip, action).await {
            self.record_denial(EventType::RateLimitExceeded, action, client, "ceiling reached")
                .await;
            return Err(AccessError::RateLimited);
        }

        Ok(())
    }

    async fn record_denial(
        &self,
        event_type: EventType,
        action: ProtectedAction,
        client: &ClientContext,
        reason: &str,
    ) {
        let event = AnalyticsEvent::new(event_type, "request", action.as_str(), self.clock.now())
            .with_client(client)
            .with_metadata(json!({ "reason": reason }));
        self.audit.record(event).await;
    }
}
