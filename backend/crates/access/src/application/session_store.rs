//! Session Store
//!
//! Issues IP-bound sessions and resolves presented tokens back to them.

use platform::client::ClientContext;
use platform::clock::Clock;
use serde_json::json;
use std::sync::Arc;

use crate::application::analytics::AuditLog;
use crate::domain::entity::analytics_event::{AnalyticsEvent, EventType};
use crate::domain::entity::redemption_code::RedemptionCode;
use crate::domain::entity::session::Session;
use crate::domain::repository::{AnalyticsRepository, RedemptionUnitOfWork, SessionRepository};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::{AccessError, AccessResult};

/// A persisted session and the token for its cookie
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub token: SessionToken,
}

pub struct SessionStore<S, A>
where
    S: SessionRepository,
    A: AnalyticsRepository,
{
    repo: Arc<S>,
    audit: AuditLog<A>,
    clock: Arc<dyn Clock>,
}

impl<S, A> SessionStore<S, A>
where
    S: SessionRepository,
    A: AnalyticsRepository,
{
    pub fn new(repo: Arc<S>, audit: AuditLog<A>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, audit, clock }
    }

    /// Persist a new session for `code`.
    ///
    /// A token collision is retried once with a fresh token.
    pub async fn create(
        &self,
        code: &RedemptionCode,
        client: &ClientContext,
    ) -> AccessResult<IssuedSession> {
        let mut retried = false;
        loop {
            let issued = self.issue(code, client)?;
            match self.repo.create(&issued.session).await {
                Ok(()) => return Ok(issued),
                Err(AccessError::TokenCollision) if !retried => {
                    tracing::warn!("Session token collision, retrying with a new token");
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist a new session together with the code's usage increment.
    ///
    /// Both writes succeed or neither does. A token collision is retried once.
    pub async fn create_redeemed<U>(
        &self,
        uow: &U,
        code: &RedemptionCode,
        client: &ClientContext,
    ) -> AccessResult<IssuedSession>
    where
        U: RedemptionUnitOfWork,
    {
        let mut retried = false;
        loop {
            let issued = self.issue(code, client)?;
            match uow
                .redeem(&code.code, &issued.session, issued.session.created_at)
                .await
            {
                Ok(()) => return Ok(issued),
                Err(AccessError::TokenCollision) if !retried => {
                    tracing::warn!("Session token collision, retrying with a new token");
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn issue(&self, code: &RedemptionCode, client: &ClientContext) -> AccessResult<IssuedSession> {
        let token = SessionToken::generate()?;
        let session = Session::issue(code, client, &token, self.clock.now());
        Ok(IssuedSession { session, token })
    }

    /// Live session for `token`, if it is bound to the requesting address.
    ///
    /// An address mismatch looks like a missing session to the caller but
    /// is recorded as `session_ip_mismatch`.
    pub async fn get_active(
        &self,
        token: &SessionToken,
        client: &ClientContext,
    ) -> AccessResult<Option<Session>> {
        let now = self.clock.now();
        let Some(session) = self.repo.find_live(&token.digest(), now).await? else {
            return Ok(None);
        };
        if !session.is_live(now) {
            return Ok(None);
        }

        if !session.is_bound_to(client.ip) {
            tracing::warn!(
                session_id = %session.session_id,
                client_ip = %client.ip,
                "Session presented from a different address"
            );
            let event = AnalyticsEvent::new(
                EventType::SessionIpMismatch,
                "session",
                session.session_id.to_string(),
                now,
            )
            .with_client(client)
            .with_metadata(json!({ "code": session.code.as_str() }));
            self.audit.record(event).await;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Invalidate the session behind `token`. Unknown or already finished
    /// sessions are not an error.
    pub async fn invalidate(
        &self,
        token: &SessionToken,
        client: &ClientContext,
    ) -> AccessResult<bool> {
        let Some(session_id) = self.repo.invalidate(&token.digest()).await? else {
            return Ok(false);
        };

        tracing::info!(session_id = %session_id, "Session invalidated");
        let event = AnalyticsEvent::new(
            EventType::SessionInvalidated,
            "session",
            session_id.to_string(),
            self.clock.now(),
        )
        .with_client(client);
        self.audit.record(event).await;

        Ok(true)
    }

    /// Flip active sessions past expiry to `expired`
    pub async fn sweep_expired(&self) -> AccessResult<u64> {
        let swept = self.repo.sweep_expired(self.clock.now()).await?;
        if swept > 0 {
            tracing::info!(sessions_expired = swept, "Expired sessions swept");
        }
        Ok(swept)
    }
}
