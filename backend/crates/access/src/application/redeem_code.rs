//! Redeem Code Use Case
//!
//! CSRF proof, rate limit, code validation, then one transaction that counts
//! the use and creates the session.

use chrono::{DateTime, Utc};
use platform::client::ClientContext;
use platform::clock::Clock;
use platform::csrf::CsrfGuard;
use platform::rate_limit::RateLimitStore;
use platform::secret_box::SecretCipher;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::analytics::AuditLog;
use crate::application::code_store::CodeStore;
use crate::application::config::{AccessConfig, ProtectedAction};
use crate::application::request_guard::RequestGuard;
use crate::application::session_store::SessionStore;
use crate::domain::entity::analytics_event::{AnalyticsEvent, EventType};
use crate::domain::repository::{
    AnalyticsRepository, CodeRepository, RedemptionUnitOfWork, SessionRepository,
};
use crate::domain::value_object::{code_value::CodeValue, session_token::SessionToken};
use crate::error::{AccessError, AccessResult};

/// Redeem input
pub struct RedeemCodeInput {
    /// Code as typed by the user; `None` when the body could not be read
    pub code: Option<String>,
    /// Value of the `X-CSRF-Token` header
    pub csrf_token: Option<String>,
}

/// Redeem output
#[derive(Debug)]
pub struct RedeemCodeOutput {
    pub session_id: Uuid,
    /// Token for the session cookie
    pub session_token: SessionToken,
    pub code: CodeValue,
    pub duration_minutes: i32,
    pub expires_at: DateTime<Utc>,
}

/// Redeem code use case
pub struct RedeemCodeUseCase<R, L>
where
    R: CodeRepository + SessionRepository + RedemptionUnitOfWork + AnalyticsRepository,
    L: RateLimitStore,
{
    uow: Arc<R>,
    guard: RequestGuard<L, R>,
    codes: CodeStore<R, R>,
    sessions: SessionStore<R, R>,
    audit: AuditLog<R>,
}

impl<R, L> RedeemCodeUseCase<R, L>
where
    R: CodeRepository + SessionRepository + RedemptionUnitOfWork + AnalyticsRepository,
    L: RateLimitStore,
{
    pub fn new(
        repo: Arc<R>,
        limit_store: Arc<L>,
        cipher: Arc<SecretCipher>,
        csrf: Arc<CsrfGuard>,
        clock: Arc<dyn Clock>,
        config: Arc<AccessConfig>,
    ) -> Self {
        let audit = AuditLog::new(repo.clone());
        Self {
            uow: repo.clone(),
            guard: RequestGuard::new(
                csrf,
                limit_store,
                audit.clone(),
                clock.clone(),
                config.clone(),
            ),
            codes: CodeStore::new(repo.clone(), audit.clone(), cipher, clock.clone(), config),
            sessions: SessionStore::new(repo, audit.clone(), clock),
            audit,
        }
    }

    pub async fn execute(
        &self,
        input: RedeemCodeInput,
        client: &ClientContext,
    ) -> AccessResult<RedeemCodeOutput> {
        self.guard
            .check(ProtectedAction::Redeem, input.csrf_token.as_deref(), client)
            .await?;

        let raw = input.code.ok_or_else(AccessError::unreadable_body)?;
        let code = self.codes.normalize(&raw)?;
        let found = self.codes.validate(&code, client).await?;

        let issued = match self.sessions.create_redeemed(&*self.uow, &found, client).await {
            Ok(issued) => issued,
            Err(AccessError::CodeRejected(rejection)) => {
                // Lost the race for the last use, or the code changed after validation
                self.codes.record_rejection(&code, rejection, client).await;
                return Err(AccessError::CodeRejected(rejection));
            }
            Err(e) => return Err(e),
        };

        let session = &issued.session;
        tracing::info!(
            session_id = %session.session_id,
            code = %code,
            client_ip = %client.ip,
            duration_minutes = session.duration_minutes,
            "Code redeemed"
        );
        let event = AnalyticsEvent::new(
            EventType::CodeRedeemed,
            "code",
            code.as_str(),
            session.created_at,
        )
        .with_client(client)
        .with_metadata(json!({
            "session_id": session.session_id.to_string(),
            "duration_minutes": session.duration_minutes,
        }));
        self.audit.record(event).await;

        Ok(RedeemCodeOutput {
            session_id: session.session_id,
            duration_minutes: session.duration_minutes,
            expires_at: session.expires_at,
            code,
            session_token: issued.token,
        })
    }
}
