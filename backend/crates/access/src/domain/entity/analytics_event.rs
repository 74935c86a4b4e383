//! Analytics Event Entity
//!
//! Append-only audit stream. Every denial path records its own event type
//! so anomalies can be told apart later.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CodeCreated,
    CodeUpdated,
    CodeDeleted,
    CodeValidationFailed,
    CodeRedeemed,
    RateLimitExceeded,
    CsrfRejected,
    SessionIpMismatch,
    SessionInvalidated,
    PlaybackDenied,
    VideoPlaybackRequested,
    DailyCleanupCompleted,
}

impl EventType {
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CodeCreated => "code_created",
            Self::CodeUpdated => "code_updated",
            Self::CodeDeleted => "code_deleted",
            Self::CodeValidationFailed => "code_validation_failed",
            Self::CodeRedeemed => "code_redeemed",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::CsrfRejected => "csrf_rejected",
            Self::SessionIpMismatch => "session_ip_mismatch",
            Self::SessionInvalidated => "session_invalidated",
            Self::PlaybackDenied => "playback_denied",
            Self::VideoPlaybackRequested => "video_playback_requested",
            Self::DailyCleanupCompleted => "daily_cleanup_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Analytics event entity
#[derive(Debug, Clone)]
pub struct AnalyticsEvent {
    pub event_type: EventType,
    /// `code`, `session`, `video`, `request` or `system`
    pub object_type: &'static str,
    pub object_id: String,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(
        event_type: EventType,
        object_type: &'static str,
        object_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            object_type,
            object_id: object_id.into(),
            ip_address: None,
            user_agent: None,
            metadata: Value::Object(Default::default()),
            created_at: now,
        }
    }

    /// Attach the requesting client
    pub fn with_client(mut self, client: &platform::client::ClientContext) -> Self {
        self.ip_address = Some(client.ip);
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
