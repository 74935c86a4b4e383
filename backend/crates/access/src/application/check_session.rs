//! Check Session Use Case
//!
//! Reports the caller's live session, if any.

use chrono::{DateTime, Utc};
use platform::client::ClientContext;
use platform::clock::Clock;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::analytics::AuditLog;
use crate::application::session_store::SessionStore;
use crate::domain::entity::session::Session;
use crate::domain::repository::{AnalyticsRepository, SessionRepository};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::AccessResult;

/// Session info output
#[derive(Debug, Clone)]
pub struct SessionInfoOutput {
    pub session_id: Uuid,
    pub duration_minutes: i32,
    pub expires_at: DateTime<Utc>,
    pub remaining_minutes: i64,
}

/// Check session use case
pub struct CheckSessionUseCase<R>
where
    R: SessionRepository + AnalyticsRepository,
{
    sessions: SessionStore<R, R>,
    clock: Arc<dyn Clock>,
}

impl<R> CheckSessionUseCase<R>
where
    R: SessionRepository + AnalyticsRepository,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        let audit = AuditLog::new(repo.clone());
        Self {
            sessions: SessionStore::new(repo, audit, clock.clone()),
            clock,
        }
    }

    /// Session info when the cookie names a live session bound to this client
    pub async fn execute(
        &self,
        session_token: Option<&str>,
        client: &ClientContext,
    ) -> AccessResult<Option<SessionInfoOutput>> {
        let session = self.get_session(session_token, client).await?;
        let now = self.clock.now();

        Ok(session.map(|session| SessionInfoOutput {
            session_id: session.session_id,
            duration_minutes: session.duration_minutes,
            expires_at: session.expires_at,
            remaining_minutes: session.remaining_minutes(now),
        }))
    }

    /// Live, IP-bound session for a raw cookie value
    pub async fn get_session(
        &self,
        session_token: Option<&str>,
        client: &ClientContext,
    ) -> AccessResult<Option<Session>> {
        match session_token.and_then(SessionToken::from_presented) {
            Some(token) => self.sessions.get_active(&token, client).await,
            None => Ok(None),
        }
    }
}
