//! Sign Out Use Case
//!
//! Invalidates the caller's session.

use platform::client::ClientContext;
use platform::clock::Clock;
use platform::csrf::CsrfGuard;
use platform::rate_limit::RateLimitStore;
use std::sync::Arc;

use crate::application::analytics::AuditLog;
use crate::application::config::{AccessConfig, ProtectedAction};
use crate::application::request_guard::RequestGuard;
use crate::application::session_store::SessionStore;
use crate::domain::repository::{AnalyticsRepository, SessionRepository};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::AccessResult;

/// Sign out use case
pub struct SignOutUseCase<R, L>
where
    R: SessionRepository + AnalyticsRepository,
    L: RateLimitStore,
{
    guard: RequestGuard<L, R>,
    sessions: SessionStore<R, R>,
}

impl<R, L> SignOutUseCase<R, L>
where
    R: SessionRepository + AnalyticsRepository,
    L: RateLimitStore,
{
    pub fn new(
        repo: Arc<R>,
        limit_store: Arc<L>,
        csrf: Arc<CsrfGuard>,
        clock: Arc<dyn Clock>,
        config: Arc<AccessConfig>,
    ) -> Self {
        let audit = AuditLog::new(repo.clone());
        Self {
            guard: RequestGuard::new(csrf, limit_store, audit.clone(), clock.clone(), config),
            sessions: SessionStore::new(repo, audit, clock),
        }
    }

    /// Invalidate the session behind `session_token`, if any.
    ///
    /// Returns whether a live session was ended; a missing or already
    /// finished session is not an error.
    pub async fn execute(
        &self,
        session_token: Option<&str>,
        csrf_token: Option<&str>,
        client: &ClientContext,
    ) -> AccessResult<bool> {
        self.guard
            .check(ProtectedAction::Logout, csrf_token, client)
            .await?;

        match session_token.and_then(SessionToken::from_presented) {
            Some(token) => self.sessions.invalidate(&token, client).await,
            None => Ok(false),
        }
    }
}
