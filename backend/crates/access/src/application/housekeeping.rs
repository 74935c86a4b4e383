//! Housekeeping Use Case
//!
//! Recurring storage hygiene: expired sessions, analytics retention and
//! closed rate-limit windows. None of it is needed for correctness.

use platform::clock::Clock;
use platform::rate_limit::RateLimitStore;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::application::analytics::AuditLog;
use crate::application::config::AccessConfig;
use crate::application::rate_limiter::RateLimiter;
use crate::application::session_store::SessionStore;
use crate::domain::entity::analytics_event::{AnalyticsEvent, EventType};
use crate::domain::repository::{AnalyticsRepository, SessionRepository};
use crate::error::AccessResult;

/// Counts from one housekeeping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HousekeepingReport {
    pub sessions_expired: u64,
    pub events_pruned: u64,
    pub rate_limits_purged: u64,
}

/// Housekeeping use case
pub struct HousekeepingUseCase<R, L>
where
    R: SessionRepository + AnalyticsRepository,
    L: RateLimitStore,
{
    sessions: SessionStore<R, R>,
    limiter: RateLimiter<L>,
    audit: AuditLog<R>,
    clock: Arc<dyn Clock>,
    config: Arc<AccessConfig>,
}

impl<R, L> HousekeepingUseCase<R, L>
where
    R: SessionRepository + AnalyticsRepository,
    L: RateLimitStore,
{
    pub fn new(
        repo: Arc<R>,
        limit_store: Arc<L>,
        clock: Arc<dyn Clock>,
        config: Arc<AccessConfig>,
    ) -> Self {
        let audit = AuditLog::new(repo.clone());
        Self {
            sessions: SessionStore::new(repo, audit.clone(), clock.clone()),
            limiter: RateLimiter::new(limit_store, config.clone()),
            audit,
            clock,
            config,
        }
    }

    pub async fn run(&self) -> AccessResult<HousekeepingReport> {
        let sessions_expired = self.sessions.sweep_expired().await?;

        let cutoff = self.clock.now() - self.config.analytics_retention;
        let events_pruned = self.audit.prune_older_than(cutoff).await?;

        let rate_limits_purged = self.limiter.purge_expired().await;

        let report = HousekeepingReport {
            sessions_expired,
            events_pruned,
            rate_limits_purged,
        };

        tracing::info!(
            sessions_expired,
            events_pruned,
            rate_limits_purged,
            "Housekeeping completed"
        );
        let event = AnalyticsEvent::new(
            EventType::DailyCleanupCompleted,
            "system",
            "housekeeping",
            self.clock.now(),
        )
        .with_metadata(json!(report));
        self.audit.record(event).await;

        Ok(report)
    }
}
