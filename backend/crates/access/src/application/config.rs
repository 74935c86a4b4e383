//! Application Configuration
//!
//! Configuration for the Access application layer.

use chrono::Duration;
use platform::cookie::CookieConfig;
use platform::rate_limit::RateLimitConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// State-changing requests that carry a CSRF proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectedAction {
    Redeem,
    Playback,
    Logout,
}

impl ProtectedAction {
    pub const ALL: [ProtectedAction; 3] = [
        ProtectedAction::Redeem,
        ProtectedAction::Playback,
        ProtectedAction::Logout,
    ];

    /// Scope name for CSRF proofs and rate-limit keys
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Redeem => "redeem",
            Self::Playback => "playback",
            Self::Logout => "logout",
        }
    }
}

/// Access application configuration
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Whether to require Secure cookie (TLS)
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Keep codes as typed instead of upper-casing them
    pub case_sensitive_codes: bool,
    /// Honor CF-Connecting-IP / X-Real-IP / X-Forwarded-For
    pub trust_proxy_headers: bool,
    /// Lifetime of CSRF proofs (12 hours)
    pub csrf_ttl: Duration,
    /// Redemption attempts per client (5 per 5 minutes)
    pub redeem_rate_limit: RateLimitConfig,
    /// Playback requests per client (60 per 5 minutes)
    pub playback_rate_limit: RateLimitConfig,
    /// Analytics events older than this are pruned (90 days)
    pub analytics_retention: Duration,
    /// Maximum accepted video id length
    pub max_video_id_length: usize,
    /// Upper bound for library listings
    pub library_limit: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "access_session".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Strict,
            case_sensitive_codes: false,
            trust_proxy_headers: false,
            csrf_ttl: Duration::hours(12),
            redeem_rate_limit: RateLimitConfig::new(5, 300),
            playback_rate_limit: RateLimitConfig::new(60, 300),
            analytics_retention: Duration::days(90),
            max_video_id_length: 100,
            library_limit: 50,
        }
    }
}

impl AccessConfig {
    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Default::default()
        }
    }

    /// Session cookie attributes: HttpOnly, SameSite per config, Secure when TLS
    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
        }
    }

    /// Rate limit applied to `action`, if any
    pub fn rate_limit_for(&self, action: ProtectedAction) -> Option<&RateLimitConfig> {
        match action {
            ProtectedAction::Redeem => Some(&self.redeem_rate_limit),
            ProtectedAction::Playback => Some(&self.playback_rate_limit),
            ProtectedAction::Logout => None,
        }
    }
}
