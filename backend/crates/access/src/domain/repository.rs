//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the
//! infrastructure layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entity::{
    analytics_event::AnalyticsEvent, protected_video::ProtectedVideo,
    redemption_code::RedemptionCode, session::Session,
};
use crate::domain::value_object::{code_status::CodeStatus, code_value::CodeValue};
use crate::error::AccessResult;

/// Listing filter for codes
#[derive(Debug, Clone, Default)]
pub struct CodeFilter {
    pub status: Option<CodeStatus>,
    /// Case-insensitive substring of the code or description
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Code counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CodeStats {
    pub total: u64,
    pub active: u64,
    pub used: u64,
    pub expired: u64,
    pub disabled: u64,
}

/// Listing filter for videos
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub integration_type: Option<String>,
    /// Case-insensitive substring of the video id, title or description
    pub search: Option<String>,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// Redemption code repository trait
#[trait_variant::make(CodeRepository: Send)]
pub trait LocalCodeRepository {
    /// Create a new code; `AccessError::CodeTaken` if the value exists
    async fn create(&self, code: &RedemptionCode) -> AccessResult<()>;

    /// Exact lookup by normalized value
    async fn find_by_code(&self, code: &CodeValue) -> AccessResult<Option<RedemptionCode>>;

    /// List codes, newest first
    async fn list(&self, filter: &CodeFilter) -> AccessResult<Vec<RedemptionCode>>;

    /// Count one use in a single conditional update.
    ///
    /// Increments `current_uses` only while the code is active, unexpired
    /// and under its cap, flipping status to `used` when the cap is reached.
    /// Returns `false` when the condition did not hold.
    async fn record_redemption(&self, code: &CodeValue, now: DateTime<Utc>) -> AccessResult<bool>;

    /// Rewrite the editable terms: duration, cap, deadline, allow-list and
    /// description. Status and usage are left alone.
    async fn update(&self, code: &RedemptionCode) -> AccessResult<bool>;

    /// Administrative status change; `Active` also resets `current_uses`
    async fn set_status(
        &self,
        code: &CodeValue,
        status: CodeStatus,
        now: DateTime<Utc>,
    ) -> AccessResult<bool>;

    /// Physical delete; issued sessions are kept
    async fn delete(&self, code: &CodeValue) -> AccessResult<bool>;

    async fn stats(&self) -> AccessResult<CodeStats>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Persist a new session; `AccessError::TokenCollision` on duplicate digest
    async fn create(&self, session: &Session) -> AccessResult<()>;

    /// Find an `active` session with `expires_at > now` by token digest
    async fn find_live(&self, token_digest: &[u8; 32], now: DateTime<Utc>)
    -> AccessResult<Option<Session>>;

    /// Flip an `active` session to `invalidated`, returning its id when a
    /// row changed
    async fn invalidate(&self, token_digest: &[u8; 32]) -> AccessResult<Option<Uuid>>;

    /// Flip every `active` session past expiry to `expired`
    async fn sweep_expired(&self, now: DateTime<Utc>) -> AccessResult<u64>;
}

/// Redemption transaction
#[trait_variant::make(RedemptionUnitOfWork: Send)]
pub trait LocalRedemptionUnitOfWork {
    /// Count one use of `code` and persist `session`, all or nothing.
    ///
    /// ## Errors
    /// * `CodeRejected(UsageLimit)` - the conditional increment matched no row
    /// * `TokenCollision` - the session digest already exists
    async fn redeem(&self, code: &CodeValue, session: &Session, now: DateTime<Utc>)
    -> AccessResult<()>;
}

/// Protected video repository trait
#[trait_variant::make(VideoRepository: Send)]
pub trait LocalVideoRepository {
    async fn create(&self, video: &ProtectedVideo) -> AccessResult<()>;

    async fn find_by_video_id(&self, video_id: &str) -> AccessResult<Option<ProtectedVideo>>;

    /// Active videos ordered by title
    async fn list_active(&self, filter: &VideoFilter) -> AccessResult<Vec<ProtectedVideo>>;

    /// Active videos matching `filter`, ignoring its limit and offset
    async fn count_active(&self, filter: &VideoFilter) -> AccessResult<u64>;
}

/// Analytics repository trait
#[trait_variant::make(AnalyticsRepository: Send)]
pub trait LocalAnalyticsRepository {
    async fn record(&self, event: &AnalyticsEvent) -> AccessResult<()>;

    /// Delete events created before `cutoff`
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> AccessResult<u64>;
}
