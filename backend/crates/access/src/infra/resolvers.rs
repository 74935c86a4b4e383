//! Playback Resolvers
//!
//! Provider strategies shipped with the service. Each one only turns an
//! already-authorized video into something the client can play.

use chrono::{DateTime, Utc};
use platform::crypto::sha256;
use serde_json::{Map, Value, json};

use crate::domain::entity::protected_video::ProtectedVideo;
use crate::domain::playback::{PlaybackDescriptor, PlaybackKind, PlaybackResolver, ResolveError};

/// Default lifetime of a signed playback URL
pub const DEFAULT_SIGNED_URL_TTL_SECS: i64 = 3600;

fn provider_ref(video: &ProtectedVideo) -> Result<&str, ResolveError> {
    video
        .provider_ref
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ResolveError::MissingReference(video.video_id.clone()))
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// Embed
// ============================================================================

/// Renders an iframe pointing at the provider's player
#[derive(Debug, Clone)]
pub struct EmbedResolver {
    provider: String,
    player_base: String,
}

impl EmbedResolver {
    pub fn new(provider: impl Into<String>, player_base: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            player_base: player_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl PlaybackResolver for EmbedResolver {
    fn resolve(
        &self,
        video: &ProtectedVideo,
        _now: DateTime<Utc>,
    ) -> Result<PlaybackDescriptor, ResolveError> {
        let player_id = provider_ref(video)?;
        let src = format!("{}/{}", self.player_base, player_id);
        let embed_html = format!(
            r#"<iframe src="{}" title="{}" allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe>"#,
            escape_attr(&src),
            escape_attr(&video.title),
        );

        Ok(PlaybackDescriptor {
            kind: PlaybackKind::Embed,
            provider: self.provider.clone(),
            payload: payload(json!({
                "embed_html": embed_html,
                "player_id": player_id,
            })),
        })
    }
}

// ============================================================================
// Signed URL
// ============================================================================

/// CDN token authentication: `token = hex(sha256(key || path || expires))`
#[derive(Clone)]
pub struct SignedUrlResolver {
    provider: String,
    base_url: String,
    token_key: String,
    ttl_secs: i64,
}

impl SignedUrlResolver {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        token_key: impl Into<String>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_key: token_key.into(),
            ttl_secs: ttl_secs.max(1),
        }
    }

    fn sign(&self, path: &str, expires: i64) -> String {
        let data = format!("{}{}{}", self.token_key, path, expires);
        hex::encode(sha256(data.as_bytes()))
    }
}

impl std::fmt::Debug for SignedUrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlResolver")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl PlaybackResolver for SignedUrlResolver {
    fn resolve(
        &self,
        video: &ProtectedVideo,
        now: DateTime<Utc>,
    ) -> Result<PlaybackDescriptor, ResolveError> {
        let reference = provider_ref(video)?;
        if reference.contains(['?', '#']) || reference.chars().any(char::is_whitespace) {
            return Err(ResolveError::Provider(format!(
                "unusable provider reference for video {}",
                video.video_id
            )));
        }

        let path = format!("/{}", reference.trim_start_matches('/'));
        let expires = now.timestamp() + self.ttl_secs;
        let token = self.sign(&path, expires);
        let playback_url = format!(
            "{}{}?token={}&expires={}",
            self.base_url, path, token, expires
        );

        Ok(PlaybackDescriptor {
            kind: PlaybackKind::Url,
            provider: self.provider.clone(),
            payload: payload(json!({
                "playback_url": playback_url,
                "expires_in": self.ttl_secs,
                "video_ref": reference,
            })),
        })
    }
}

// ============================================================================
// Direct URL
// ============================================================================

/// Passes the video's stored URL through unchanged
#[derive(Debug, Clone)]
pub struct DirectUrlResolver {
    provider: String,
}

impl DirectUrlResolver {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl PlaybackResolver for DirectUrlResolver {
    fn resolve(
        &self,
        video: &ProtectedVideo,
        _now: DateTime<Utc>,
    ) -> Result<PlaybackDescriptor, ResolveError> {
        let url = video
            .direct_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ResolveError::MissingReference(video.video_id.clone()))?;

        Ok(PlaybackDescriptor {
            kind: PlaybackKind::Url,
            provider: self.provider.clone(),
            payload: payload(json!({ "playback_url": url })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::protected_video::VideoStatus;
    use chrono::TimeZone;

    fn video(provider_ref: Option<&str>, direct_url: Option<&str>) -> ProtectedVideo {
        ProtectedVideo {
            video_id: "intro".to_string(),
            title: "Intro \"Part 1\"".to_string(),
            required_minutes: 30,
            integration_type: "test".to_string(),
            provider_ref: provider_ref.map(str::to_string),
            direct_url: direct_url.map(str::to_string),
            description: None,
            category: None,
            status: VideoStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_embed_escapes_markup() {
        let resolver = EmbedResolver::new("presto", "https://player.example.com/embed/");
        let descriptor = resolver.resolve(&video(Some("42"), None), at()).unwrap();

        assert_eq!(descriptor.kind, PlaybackKind::Embed);
        assert_eq!(descriptor.provider, "presto");
        assert_eq!(descriptor.payload["player_id"], "42");
        let html = descriptor.payload["embed_html"].as_str().unwrap();
        assert!(html.contains(r#"src="https://player.example.com/embed/42""#));
        assert!(html.contains("Intro &quot;Part 1&quot;"));
    }

    #[test]
    fn test_embed_requires_reference() {
        let resolver = EmbedResolver::new("presto", "https://player.example.com");
        let err = resolver.resolve(&video(Some("  "), None), at()).unwrap_err();
        assert!(matches!(err, ResolveError::MissingReference(id) if id == "intro"));
    }

    #[test]
    fn test_signed_url_token() {
        let resolver =
            SignedUrlResolver::new("bunny", "https://cdn.example.com/", "secret", 3600);
        let descriptor = resolver
            .resolve(&video(Some("library/video.mp4"), None), at())
            .unwrap();

        let expires = at().timestamp() + 3600;
        let expected_token =
            hex::encode(sha256(format!("secret/library/video.mp4{}", expires).as_bytes()));
        assert_eq!(descriptor.kind, PlaybackKind::Url);
        assert_eq!(
            descriptor.payload["playback_url"],
            format!(
                "https://cdn.example.com/library/video.mp4?token={}&expires={}",
                expected_token, expires
            )
        );
        assert_eq!(descriptor.payload["expires_in"], 3600);
    }

    #[test]
    fn test_signed_url_rejects_query_in_reference() {
        let resolver = SignedUrlResolver::new("bunny", "https://cdn.example.com", "secret", 60);
        let err = resolver
            .resolve(&video(Some("a.mp4?x=1"), None), at())
            .unwrap_err();
        assert!(matches!(err, ResolveError::Provider(_)));
    }

    #[test]
    fn test_signed_url_debug_hides_key() {
        let resolver = SignedUrlResolver::new("bunny", "https://cdn.example.com", "secret", 60);
        assert!(!format!("{:?}", resolver).contains("secret"));
    }

    #[test]
    fn test_direct_url_passthrough() {
        let resolver = DirectUrlResolver::new("direct");
        let descriptor = resolver
            .resolve(&video(None, Some("https://media.example.com/a.mp4")), at())
            .unwrap();
        assert_eq!(
            descriptor.payload["playback_url"],
            "https://media.example.com/a.mp4"
        );

        assert!(resolver.resolve(&video(None, None), at()).is_err());
    }
}
