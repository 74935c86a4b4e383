//! API DTOs (Data Transfer Objects)
//!
//! Field names are snake_case on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::{LibraryEntry, VideoLibraryOutput};

// ============================================================================
// CSRF
// ============================================================================

/// CSRF proofs, one per protected action
#[derive(Debug, Clone, Serialize)]
pub struct CsrfTokensResponse {
    /// Action name (`redeem`, `playback`, `logout`) to proof
    pub tokens: BTreeMap<&'static str, String>,
    pub expires_in: i64,
}

// ============================================================================
// Redeem
// ============================================================================

/// Redeem request
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    #[serde(default)]
    pub code: String,
}

/// Redeem response
#[derive(Debug, Clone, Serialize)]
pub struct RedeemResponse {
    pub duration_minutes: i32,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Playback
// ============================================================================

/// Playback request
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackRequest {
    #[serde(default)]
    pub video_id: String,
}

// ============================================================================
// Session Status
// ============================================================================

/// Session status response
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    pub active: bool,
    pub duration_minutes: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_minutes: Option<i64>,
}

impl SessionStatusResponse {
    pub fn inactive() -> Self {
        Self {
            active: false,
            duration_minutes: None,
            expires_at: None,
            remaining_minutes: None,
        }
    }
}

// ============================================================================
// Video Library
// ============================================================================

/// Library query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryQuery {
    pub integration_type: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

/// One library row
#[derive(Debug, Clone, Serialize)]
pub struct LibraryVideo {
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub required_minutes: i32,
    pub integration_type: String,
    pub category: Option<String>,
    pub has_access: bool,
}

impl From<LibraryEntry> for LibraryVideo {
    fn from(entry: LibraryEntry) -> Self {
        let video = entry.video;
        Self {
            video_id: video.video_id,
            title: video.title,
            description: video.description,
            required_minutes: video.required_minutes,
            integration_type: video.integration_type,
            category: video.category,
            has_access: entry.has_access,
        }
    }
}

/// Library response
#[derive(Debug, Clone, Serialize)]
pub struct LibraryResponse {
    pub session_minutes: Option<i32>,
    pub videos: Vec<LibraryVideo>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl From<VideoLibraryOutput> for LibraryResponse {
    fn from(output: VideoLibraryOutput) -> Self {
        Self {
            session_minutes: output.session_minutes,
            videos: output.videos.into_iter().map(LibraryVideo::from).collect(),
            total: output.total,
            limit: output.limit,
            offset: output.offset,
        }
    }
}
