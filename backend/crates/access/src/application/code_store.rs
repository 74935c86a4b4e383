//! Code Store
//!
//! Redemption code lookup, validation and administration. Secure tokens are
//! sealed with [`SecretCipher`] before they reach the repository and are
//! only opened on explicit request.

use chrono::{DateTime, Utc};
use platform::client::ClientContext;
use platform::clock::Clock;
use platform::crypto::generate_token;
use platform::secret_box::SecretCipher;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::analytics::AuditLog;
use crate::application::config::AccessConfig;
use crate::domain::entity::analytics_event::{AnalyticsEvent, EventType};
use crate::domain::entity::redemption_code::RedemptionCode;
use crate::domain::repository::{AnalyticsRepository, CodeFilter, CodeRepository, CodeStats};
use crate::domain::value_object::{
    code_rejection::CodeRejection,
    code_status::CodeStatus,
    code_value::{CodeFormat, CodeValue, generate_code},
    ip_allow_list::IpAllowList,
};
use crate::error::{AccessError, AccessResult};

/// Random bytes in a code's secure token
const SECURE_TOKEN_BYTES: usize = 32;

/// Attempts at finding a free generated code value
const GENERATE_ATTEMPTS: usize = 5;

/// New code request
#[derive(Debug, Clone)]
pub struct NewCode {
    /// Explicit value; generated from `format` when `None`
    pub code: Option<String>,
    pub format: CodeFormat,
    pub duration_minutes: i32,
    /// 0 means unlimited
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw allow-list text, validated strictly
    pub ip_restrictions: Option<String>,
    pub description: Option<String>,
}

impl Default for NewCode {
    fn default() -> Self {
        Self {
            code: None,
            format: CodeFormat::default(),
            duration_minutes: 60,
            max_uses: 1,
            expires_at: None,
            ip_restrictions: None,
            description: None,
        }
    }
}

/// Edit of an existing code's terms; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct CodeUpdate {
    pub duration_minutes: Option<i32>,
    pub max_uses: Option<i32>,
    /// `Some(None)` removes the deadline
    pub expires_at: Option<Option<DateTime<Utc>>>,
    /// Raw allow-list text; blank removes the restriction
    pub ip_restrictions: Option<String>,
    /// `Some(None)` removes the description
    pub description: Option<Option<String>>,
}

fn check_terms(duration_minutes: i32, max_uses: i32) -> AccessResult<()> {
    if duration_minutes <= 0 {
        return Err(AccessError::InvalidInput(
            "Duration must be at least one minute.".to_string(),
        ));
    }
    if max_uses < 0 {
        return Err(AccessError::InvalidInput(
            "Maximum uses cannot be negative.".to_string(),
        ));
    }
    Ok(())
}

/// Listing row; `secure_token` is only filled when revealing was requested
#[derive(Debug, Clone)]
pub struct CodeListing {
    pub code: RedemptionCode,
    pub secure_token: Option<String>,
}

pub struct CodeStore<C, A>
where
    C: CodeRepository,
    A: AnalyticsRepository,
{
    repo: Arc<C>,
    audit: AuditLog<A>,
    cipher: Arc<SecretCipher>,
    clock: Arc<dyn Clock>,
    config: Arc<AccessConfig>,
}

impl<C, A> CodeStore<C, A>
where
    C: CodeRepository,
    A: AnalyticsRepository,
{
    pub fn new(
        repo: Arc<C>,
        audit: AuditLog<A>,
        cipher: Arc<SecretCipher>,
        clock: Arc<dyn Clock>,
        config: Arc<AccessConfig>,
    ) -> Self {
        Self {
            repo,
            audit,
            cipher,
            clock,
            config,
        }
    }

    /// Normalize user input per the configured case policy
    pub fn normalize(&self, raw: &str) -> AccessResult<CodeValue> {
        CodeValue::parse(raw, self.config.case_sensitive_codes)
    }

    /// Case-normalized exact lookup
    pub async fn find_by_code(&self, raw: &str) -> AccessResult<Option<RedemptionCode>> {
        let code = self.normalize(raw)?;
        self.repo.find_by_code(&code).await
    }

    /// Existence, expiry, IP restriction, status, usage cap; first failure wins.
    ///
    /// Every failure is recorded as a `code_validation_failed` event carrying
    /// its reason.
    pub async fn validate(
        &self,
        code: &CodeValue,
        client: &ClientContext,
    ) -> AccessResult<RedemptionCode> {
        let now = self.clock.now();
        let checked = match self.repo.find_by_code(code).await? {
            None => Err(CodeRejection::NotFound),
            Some(found) => found.check_redeemable(now, client.ip).map(|_| found),
        };

        match checked {
            Ok(found) => Ok(found),
            Err(rejection) => {
                self.record_rejection(code, rejection, client).await;
                Err(AccessError::CodeRejected(rejection))
            }
        }
    }

    /// Record a refused redemption attempt
    pub async fn record_rejection(
        &self,
        code: &CodeValue,
        rejection: CodeRejection,
        client: &ClientContext,
    ) {
        tracing::info!(
            code = %code,
            client_ip = %client.ip,
            reason = rejection.reason(),
            "Code validation failed"
        );
        let event = AnalyticsEvent::new(
            EventType::CodeValidationFailed,
            "code",
            code.as_str(),
            self.clock.now(),
        )
        .with_client(client)
        .with_metadata(json!({ "reason": rejection.reason() }));
        self.audit.record(event).await;
    }

    /// Count one use outside a redemption transaction.
    ///
    /// Returns `false` when the code was no longer redeemable.
    pub async fn record_redemption(&self, code: &CodeValue) -> AccessResult<bool> {
        self.repo.record_redemption(code, self.clock.now()).await
    }

    /// Create a code with a fresh sealed secure token
    pub async fn create(&self, new: NewCode) -> AccessResult<RedemptionCode> {
        check_terms(new.duration_minutes, new.max_uses)?;
        let ip_restrictions = match new.ip_restrictions.as_deref() {
            Some(raw) => IpAllowList::parse(raw)?,
            None => None,
        };

        let secure_token = generate_token(SECURE_TOKEN_BYTES)?;
        let sealed_token = self.cipher.encrypt(&secure_token)?;

        let attempts = if new.code.is_some() { 1 } else { GENERATE_ATTEMPTS };
        for attempt in 1..=attempts {
            let code = match new.code.as_deref() {
                Some(raw) => self.normalize(raw)?,
                None => self.normalize(&generate_code(&new.format)?)?,
            };

            let now = self.clock.now();
            let record = RedemptionCode {
                code_id: Uuid::new_v4(),
                code,
                sealed_token: sealed_token.clone(),
                duration_minutes: new.duration_minutes,
                status: CodeStatus::Active,
                max_uses: new.max_uses,
                current_uses: 0,
                expires_at: new.expires_at,
                ip_restrictions: ip_restrictions.clone(),
                description: new.description.clone(),
                created_at: now,
                updated_at: now,
            };

            match self.repo.create(&record).await {
                Ok(()) => {
                    tracing::info!(
                        code_id = %record.code_id,
                        duration_minutes = record.duration_minutes,
                        max_uses = record.max_uses,
                        "Redemption code created"
                    );
                    self.record_admin_event(
                        EventType::CodeCreated,
                        &record.code,
                        json!({
                            "code_id": record.code_id,
                            "duration_minutes": record.duration_minutes,
                            "max_uses": record.max_uses,
                        }),
                    )
                    .await;
                    return Ok(record);
                }
                Err(AccessError::CodeTaken) if attempt < attempts => {
                    tracing::debug!(attempt, "Generated code already taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AccessError::CodeTaken)
    }

    /// Edit a code's terms. Returns `None` when the code does not exist.
    ///
    /// Status and usage are untouched; lowering the cap below the current
    /// usage makes the code unredeemable until it is re-activated.
    pub async fn update(
        &self,
        code: &CodeValue,
        update: CodeUpdate,
    ) -> AccessResult<Option<RedemptionCode>> {
        let Some(mut found) = self.repo.find_by_code(code).await? else {
            return Ok(None);
        };

        if let Some(duration_minutes) = update.duration_minutes {
            found.duration_minutes = duration_minutes;
        }
        if let Some(max_uses) = update.max_uses {
            found.max_uses = max_uses;
        }
        check_terms(found.duration_minutes, found.max_uses)?;
        if let Some(expires_at) = update.expires_at {
            found.expires_at = expires_at;
        }
        if let Some(raw) = update.ip_restrictions.as_deref() {
            found.ip_restrictions = IpAllowList::parse(raw)?;
        }
        if let Some(description) = update.description {
            found.description = description;
        }
        found.updated_at = self.clock.now();

        if !self.repo.update(&found).await? {
            return Ok(None);
        }

        tracing::info!(code = %code, "Code updated");
        self.record_admin_event(
            EventType::CodeUpdated,
            code,
            json!({
                "duration_minutes": found.duration_minutes,
                "max_uses": found.max_uses,
                "expires_at": found.expires_at,
                "ip_restrictions": found.ip_restrictions.as_ref().map(|l| l.as_str()),
            }),
        )
        .await;
        Ok(Some(found))
    }

    /// Decrypt one code's secure token
    pub async fn reveal_secure_token(&self, code: &CodeValue) -> AccessResult<Option<String>> {
        let Some(found) = self.repo.find_by_code(code).await? else {
            return Ok(None);
        };
        Ok(Some(self.cipher.decrypt(&found.sealed_token)?))
    }

    /// List codes; secure tokens stay sealed unless `reveal_tokens` is set
    pub async fn list(
        &self,
        filter: &CodeFilter,
        reveal_tokens: bool,
    ) -> AccessResult<Vec<CodeListing>> {
        let codes = self.repo.list(filter).await?;

        Ok(codes
            .into_iter()
            .map(|code| {
                let secure_token = if reveal_tokens {
                    self.open_for_listing(&code)
                } else {
                    None
                };
                CodeListing { code, secure_token }
            })
            .collect())
    }

    fn open_for_listing(&self, code: &RedemptionCode) -> Option<String> {
        match self.cipher.decrypt(&code.sealed_token) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(code_id = %code.code_id, error = %e, "Secure token could not be opened");
                None
            }
        }
    }

    /// Disable, expire or re-activate a code. Re-activation resets usage.
    pub async fn set_status(&self, code: &CodeValue, status: CodeStatus) -> AccessResult<bool> {
        let changed = self.repo.set_status(code, status, self.clock.now()).await?;
        if changed {
            tracing::info!(code = %code, status = %status, "Code status changed");
            self.record_admin_event(
                EventType::CodeUpdated,
                code,
                json!({ "status": status.code() }),
            )
            .await;
        }
        Ok(changed)
    }

    /// Delete a code; issued sessions are left alone
    pub async fn delete(&self, code: &CodeValue) -> AccessResult<bool> {
        let deleted = self.repo.delete(code).await?;
        if deleted {
            tracing::info!(code = %code, "Code deleted");
            self.record_admin_event(EventType::CodeDeleted, code, json!({})).await;
        }
        Ok(deleted)
    }

    pub async fn stats(&self) -> AccessResult<CodeStats> {
        self.repo.stats().await
    }

    async fn record_admin_event(
        &self,
        event_type: EventType,
        code: &CodeValue,
        metadata: serde_json::Value,
    ) {
        let event = AnalyticsEvent::new(event_type, "code", code.as_str(), self.clock.now())
            .with_metadata(metadata);
        self.audit.record(event).await;
    }
}
