//! Request Playback Use Case
//!
//! Gates a playback request on the caller's session, then hands the video to
//! the resolver registered for its integration type.

use platform::client::ClientContext;
use platform::clock::Clock;
use platform::csrf::CsrfGuard;
use platform::rate_limit::RateLimitStore;
use serde_json::json;
use std::sync::Arc;

use crate::application::analytics::AuditLog;
use crate::application::config::{AccessConfig, ProtectedAction};
use crate::application::request_guard::RequestGuard;
use crate::application::session_store::SessionStore;
use crate::domain::entity::analytics_event::{AnalyticsEvent, EventType};
use crate::domain::entity::protected_video::ProtectedVideo;
use crate::domain::entity::session::Session;
use crate::domain::playback::{PlaybackDescriptor, ResolverRegistry};
use crate::domain::repository::{AnalyticsRepository, SessionRepository, VideoRepository};
use crate::domain::services::can_access;
use crate::domain::value_object::session_token::SessionToken;
use crate::error::{AccessError, AccessResult};

/// Playback input
pub struct RequestPlaybackInput {
    /// `None` when the body could not be read
    pub video_id: Option<String>,
    /// Session cookie value; never taken from the request body
    pub session_token: Option<String>,
    /// Value of the `X-CSRF-Token` header
    pub csrf_token: Option<String>,
}

/// Playback output
#[derive(Debug)]
pub struct RequestPlaybackOutput {
    pub video_id: String,
    pub descriptor: PlaybackDescriptor,
}

/// Request playback use case
pub struct RequestPlaybackUseCase<R, L>
where
    R: SessionRepository + VideoRepository + AnalyticsRepository,
    L: RateLimitStore,
{
    videos: Arc<R>,
    guard: RequestGuard<L, R>,
    sessions: SessionStore<R, R>,
    audit: AuditLog<R>,
    resolvers: Arc<ResolverRegistry>,
    clock: Arc<dyn Clock>,
    config: Arc<AccessConfig>,
}

impl<R, L> RequestPlaybackUseCase<R, L>
where
    R: SessionRepository + VideoRepository + AnalyticsRepository,
    L: RateLimitStore,
{
    pub fn new(
        repo: Arc<R>,
        limit_store: Arc<L>,
        resolvers: Arc<ResolverRegistry>,
        csrf: Arc<CsrfGuard>,
        clock: Arc<dyn Clock>,
        config: Arc<AccessConfig>,
    ) -> Self {
        let audit = AuditLog::new(repo.clone());
        Self {
            videos: repo.clone(),
            guard: RequestGuard::new(
                csrf,
                limit_store,
                audit.clone(),
                clock.clone(),
                config.clone(),
            ),
            sessions: SessionStore::new(repo, audit.clone(), clock.clone()),
            audit,
            resolvers,
            clock,
            config,
        }
    }

    pub async fn execute(
        &self,
        input: RequestPlaybackInput,
        client: &ClientContext,
    ) -> AccessResult<RequestPlaybackOutput> {
        self.guard
            .check(ProtectedAction::Playback, input.csrf_token.as_deref(), client)
            .await?;

        let raw = input.video_id.ok_or_else(AccessError::unreadable_body)?;
        let video_id = self.parse_video_id(&raw)?;

        let session = self.resolve_session(input.session_token.as_deref(), client).await?;
        let Some(session) = session else {
            self.record_denial(&video_id, client, json!({ "reason": "no_session" }))
                .await;
            return Err(AccessError::SessionInvalid);
        };

        let video = self.find_active_video(&video_id).await?;
        let Some(video) = video else {
            self.record_denial(
                &video_id,
                client,
                json!({
                    "reason": "video_not_found",
                    "session_id": session.session_id.to_string(),
                }),
            )
            .await;
            return Err(AccessError::VideoNotFound);
        };

        if !can_access(session.duration_minutes, video.required_minutes) {
            self.record_denial(
                &video_id,
                client,
                json!({
                    "reason": "insufficient_duration",
                    "session_id": session.session_id.to_string(),
                    "required_minutes": video.required_minutes,
                    "session_minutes": session.duration_minutes,
                }),
            )
            .await;
            return Err(AccessError::InsufficientDuration {
                required_minutes: video.required_minutes,
                session_minutes: session.duration_minutes,
            });
        }

        let descriptor = self.resolve(&video)?;

        tracing::info!(
            session_id = %session.session_id,
            video_id = %video.video_id,
            provider = %descriptor.provider,
            "Playback granted"
        );
        let event = AnalyticsEvent::new(
            EventType::VideoPlaybackRequested,
            "video",
            video.video_id.as_str(),
            self.clock.now(),
        )
        .with_client(client)
        .with_metadata(json!({
            "session_id": session.session_id.to_string(),
            "integration_type": video.integration_type,
            "provider": descriptor.provider,
        }));
        self.audit.record(event).await;

        Ok(RequestPlaybackOutput {
            video_id: video.video_id,
            descriptor,
        })
    }

    fn parse_video_id(&self, raw: &str) -> AccessResult<String> {
        let video_id = raw.trim();
        if video_id.is_empty() {
            return Err(AccessError::InvalidInput("A video id is required.".to_string()));
        }
        if video_id.chars().count() > self.config.max_video_id_length {
            return Err(AccessError::InvalidInput("The video id is too long.".to_string()));
        }
        Ok(video_id.to_string())
    }

    async fn resolve_session(
        &self,
        token: Option<&str>,
        client: &ClientContext,
    ) -> AccessResult<Option<Session>> {
        match token.and_then(SessionToken::from_presented) {
            Some(token) => self.sessions.get_active(&token, client).await,
            None => Ok(None),
        }
    }

    async fn find_active_video(&self, video_id: &str) -> AccessResult<Option<ProtectedVideo>> {
        Ok(self
            .videos
            .find_by_video_id(video_id)
            .await?
            .filter(ProtectedVideo::is_active))
    }

    fn resolve(&self, video: &ProtectedVideo) -> AccessResult<PlaybackDescriptor> {
        let resolver = self.resolvers.get(&video.integration_type).ok_or_else(|| {
            AccessError::Resolver(format!(
                "no resolver for integration type {}",
                video.integration_type
            ))
        })?;

        resolver
            .resolve(video, self.clock.now())
            .map_err(|e| AccessError::Resolver(e.to_string()))
    }

    async fn record_denial(
        &self,
        video_id: &str,
        client: &ClientContext,
        metadata: serde_json::Value,
    ) {
        let event = AnalyticsEvent::new(EventType::PlaybackDenied, "video", video_id, self.clock.now())
            .with_client(client)
            .with_metadata(metadata);
        self.audit.record(event).await;
    }
}
