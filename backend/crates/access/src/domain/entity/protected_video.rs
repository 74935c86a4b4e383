//! Protected Video Entity
//!
//! Read-mostly catalog entry gating playback behind a minimum session
//! duration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Active,
    Inactive,
}

impl VideoStatus {
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Protected video entity
#[derive(Debug, Clone)]
pub struct ProtectedVideo {
    /// Provider-specific video id
    pub video_id: String,
    pub title: String,
    /// Minimum session duration needed to view; 0 or less means open
    pub required_minutes: i32,
    /// Selects the playback resolver
    pub integration_type: String,
    /// Provider-side reference (player id, library path)
    pub provider_ref: Option<String>,
    /// Stored URL for direct integrations
    pub direct_url: Option<String>,
    pub description: Option<String>,
    /// Library grouping, matched exactly by the category filter
    pub category: Option<String>,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
}

impl ProtectedVideo {
    pub fn is_active(&self) -> bool {
        self.status == VideoStatus::Active
    }
}
