//! Audit Log
//!
//! Best-effort writer for the analytics stream. A failed write is logged and
//! never fails the request that produced the event.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::entity::analytics_event::AnalyticsEvent;
use crate::domain::repository::AnalyticsRepository;
use crate::error::AccessResult;

pub struct AuditLog<A>
where
    A: AnalyticsRepository,
{
    repo: Arc<A>,
}

impl<A> Clone for AuditLog<A>
where
    A: AnalyticsRepository,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<A> AuditLog<A>
where
    A: AnalyticsRepository,
{
    pub fn new(repo: Arc<A>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, event: AnalyticsEvent) {
        if let Err(e) = self.repo.record(&event).await {
            tracing::warn!(
                error = %e,
                event_type = %event.event_type,
                object_id = %event.object_id,
                "Failed to record analytics event"
            );
        }
    }

    /// Retention pruning; errors propagate to the housekeeping caller
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> AccessResult<u64> {
        self.repo.prune_older_than(cutoff).await
    }
}
