//! In-Memory Repository
//!
//! All tables behind one lock, so every operation is atomic the way the
//! PostgreSQL statements are. Used by tests and local tooling.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entity::{
    analytics_event::{AnalyticsEvent, EventType},
    protected_video::ProtectedVideo,
    redemption_code::RedemptionCode,
    session::Session,
};
use crate::domain::repository::{
    AnalyticsRepository, CodeFilter, CodeRepository, CodeStats, RedemptionUnitOfWork,
    SessionRepository, VideoFilter, VideoRepository,
};
use crate::domain::value_object::{
    code_rejection::CodeRejection, code_status::CodeStatus, code_value::CodeValue,
    session_status::SessionStatus,
};
use crate::error::{AccessError, AccessResult};

#[derive(Default)]
struct Tables {
    codes: HashMap<CodeValue, RedemptionCode>,
    sessions: HashMap<[u8; 32], Session>,
    videos: HashMap<String, ProtectedVideo>,
    events: Vec<AnalyticsEvent>,
}

/// In-memory access repository
#[derive(Clone, Default)]
pub struct InMemoryAccessRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryAccessRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded analytics events, oldest first
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.tables.lock().events.clone()
    }

    /// Recorded events of one type
    pub fn events_of(&self, event_type: EventType) -> Vec<AnalyticsEvent> {
        self.tables
            .lock()
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Every stored session, any status
    pub fn sessions(&self) -> Vec<Session> {
        self.tables.lock().sessions.values().cloned().collect()
    }
}

fn page<T>(items: impl Iterator<Item = T>, limit: u32, offset: u32) -> Vec<T> {
    let limit = if limit == 0 { usize::MAX } else { limit as usize };
    items.skip(offset as usize).take(limit).collect()
}

fn video_matches(video: &ProtectedVideo, filter: &VideoFilter) -> bool {
    video.is_active()
        && filter
            .integration_type
            .as_deref()
            .is_none_or(|t| video.integration_type == t)
        && filter.category.as_deref().is_none_or(|c| video.category.as_deref() == Some(c))
        && filter.search.as_deref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            [Some(&video.video_id), Some(&video.title), video.description.as_ref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
        })
}

fn matches_search(code: &RedemptionCode, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    code.code.as_str().to_lowercase().contains(&needle)
        || code
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
}

// ============================================================================
// Code Repository Implementation
// ============================================================================

impl CodeRepository for InMemoryAccessRepository {
    async fn create(&self, code: &RedemptionCode) -> AccessResult<()> {
        let mut tables = self.tables.lock();
        if tables.codes.contains_key(&code.code) {
            return Err(AccessError::CodeTaken);
        }
        tables.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &CodeValue) -> AccessResult<Option<RedemptionCode>> {
        Ok(self.tables.lock().codes.get(code).cloned())
    }

    async fn list(&self, filter: &CodeFilter) -> AccessResult<Vec<RedemptionCode>> {
        let tables = self.tables.lock();
        let mut codes = tables
            .codes
            .values()
            .filter(|c| filter.status.is_none_or(|status| c.status == status))
            .filter(|c| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|needle| matches_search(c, needle))
            })
            .cloned()
            .collect::<Vec<_>>();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(page(codes.into_iter(), filter.limit, filter.offset))
    }

    async fn record_redemption(&self, code: &CodeValue, now: DateTime<Utc>) -> AccessResult<bool> {
        let mut tables = self.tables.lock();
        Ok(tables
            .codes
            .get_mut(code)
            .is_some_and(|found| found.record_use(now)))
    }

    async fn update(&self, code: &RedemptionCode) -> AccessResult<bool> {
        let mut tables = self.tables.lock();
        let Some(found) = tables.codes.get_mut(&code.code) else {
            return Ok(false);
        };
        found.duration_minutes = code.duration_minutes;
        found.max_uses = code.max_uses;
        found.expires_at = code.expires_at;
        found.ip_restrictions = code.ip_restrictions.clone();
        found.description = code.description.clone();
        found.updated_at = code.updated_at;
        Ok(true)
    }

    async fn set_status(
        &self,
        code: &CodeValue,
        status: CodeStatus,
        now: DateTime<Utc>,
    ) -> AccessResult<bool> {
        let mut tables = self.tables.lock();
        let Some(found) = tables.codes.get_mut(code) else {
            return Ok(false);
        };
        found.set_status(status, now);
        Ok(true)
    }

    async fn delete(&self, code: &CodeValue) -> AccessResult<bool> {
        Ok(self.tables.lock().codes.remove(code).is_some())
    }

    async fn stats(&self) -> AccessResult<CodeStats> {
        let tables = self.tables.lock();
        let mut stats = CodeStats::default();
        for code in tables.codes.values() {
            stats.total += 1;
            match code.status {
                CodeStatus::Active => stats.active += 1,
                CodeStatus::Used => stats.used += 1,
                CodeStatus::Expired => stats.expired += 1,
                CodeStatus::Disabled => stats.disabled += 1,
            }
        }
        Ok(stats)
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for InMemoryAccessRepository {
    async fn create(&self, session: &Session) -> AccessResult<()> {
        let mut tables = self.tables.lock();
        if tables.sessions.contains_key(&session.token_digest) {
            return Err(AccessError::TokenCollision);
        }
        tables.sessions.insert(session.token_digest, session.clone());
        Ok(())
    }

    async fn find_live(
        &self,
        token_digest: &[u8; 32],
        now: DateTime<Utc>,
    ) -> AccessResult<Option<Session>> {
        Ok(self
            .tables
            .lock()
            .sessions
            .get(token_digest)
            .filter(|s| s.is_live(now))
            .cloned())
    }

    async fn invalidate(&self, token_digest: &[u8; 32]) -> AccessResult<Option<Uuid>> {
        let mut tables = self.tables.lock();
        Ok(tables
            .sessions
            .get_mut(token_digest)
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| {
                s.status = SessionStatus::Invalidated;
                s.session_id
            }))
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> AccessResult<u64> {
        let mut tables = self.tables.lock();
        let mut swept = 0;
        for session in tables.sessions.values_mut() {
            if session.status == SessionStatus::Active && session.expires_at <= now {
                session.status = SessionStatus::Expired;
                swept += 1;
            }
        }
        Ok(swept)
    }
}

// ============================================================================
// Redemption Unit of Work Implementation
// ============================================================================

impl RedemptionUnitOfWork for InMemoryAccessRepository {
    async fn redeem(
        &self,
        code: &CodeValue,
        session: &Session,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let mut tables = self.tables.lock();
        if tables.sessions.contains_key(&session.token_digest) {
            return Err(AccessError::TokenCollision);
        }

        let Some(found) = tables.codes.get_mut(code) else {
            return Err(AccessError::CodeRejected(CodeRejection::NotFound));
        };
        if !found.record_use(now) {
            let rejection = found
                .check_redeemable(now, session.client_ip)
                .err()
                .unwrap_or(CodeRejection::UsageLimit);
            return Err(AccessError::CodeRejected(rejection));
        }

        tables.sessions.insert(session.token_digest, session.clone());
        Ok(())
    }
}

// ============================================================================
// Video Repository Implementation
// ============================================================================

impl VideoRepository for InMemoryAccessRepository {
    async fn create(&self, video: &ProtectedVideo) -> AccessResult<()> {
        let mut tables = self.tables.lock();
        if tables.videos.contains_key(&video.video_id) {
            return Err(AccessError::VideoTaken);
        }
        tables.videos.insert(video.video_id.clone(), video.clone());
        Ok(())
    }

    async fn find_by_video_id(&self, video_id: &str) -> AccessResult<Option<ProtectedVideo>> {
        Ok(self.tables.lock().videos.get(video_id).cloned())
    }

    async fn list_active(&self, filter: &VideoFilter) -> AccessResult<Vec<ProtectedVideo>> {
        let tables = self.tables.lock();
        let mut videos = tables
            .videos
            .values()
            .filter(|v| video_matches(v, filter))
            .cloned()
            .collect::<Vec<_>>();
        videos.sort_by(|a, b| a.title.cmp(&b.title));

        Ok(page(videos.into_iter(), filter.limit, filter.offset))
    }

    async fn count_active(&self, filter: &VideoFilter) -> AccessResult<u64> {
        let tables = self.tables.lock();
        Ok(tables.videos.values().filter(|v| video_matches(v, filter)).count() as u64)
    }
}

// ============================================================================
// Analytics Repository Implementation
// ============================================================================

impl AnalyticsRepository for InMemoryAccessRepository {
    async fn record(&self, event: &AnalyticsEvent) -> AccessResult<()> {
        self.tables.lock().events.push(event.clone());
        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> AccessResult<u64> {
        let mut tables = self.tables.lock();
        let before = tables.events.len();
        tables.events.retain(|e| e.created_at >= cutoff);
        Ok((before - tables.events.len()) as u64)
    }
}
