//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::entity::{
    analytics_event::AnalyticsEvent,
    protected_video::{ProtectedVideo, VideoStatus},
    redemption_code::RedemptionCode,
    session::Session,
};
use crate::domain::repository::{
    AnalyticsRepository, CodeFilter, CodeRepository, CodeStats, RedemptionUnitOfWork,
    SessionRepository, VideoFilter, VideoRepository,
};
use crate::domain::value_object::{
    code_rejection::CodeRejection, code_status::CodeStatus, code_value::CodeValue,
    ip_allow_list::IpAllowList, session_status::SessionStatus,
};
use crate::error::{AccessError, AccessResult};

/// PostgreSQL-backed access repository
#[derive(Clone)]
pub struct PgAccessRepository {
    pool: PgPool,
}

impl PgAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// `LIMIT` argument; 0 means no limit
fn limit_arg(limit: u32) -> Option<i64> {
    (limit > 0).then_some(i64::from(limit))
}

/// `ILIKE` pattern matching `needle` literally anywhere
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

const CODE_COLUMNS: &str = r#"
    code_id,
    code,
    sealed_token,
    duration_minutes,
    status,
    max_uses,
    current_uses,
    expires_at,
    ip_restrictions,
    description,
    created_at,
    updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    token_digest,
    code,
    host(client_ip) AS client_ip,
    user_agent,
    duration_minutes,
    status,
    expires_at,
    created_at
"#;

const VIDEO_COLUMNS: &str = r#"
    video_id,
    title,
    required_minutes,
    integration_type,
    provider_ref,
    direct_url,
    description,
    category,
    status,
    created_at
"#;

/// Active-catalog predicate shared by listing and counting.
/// `$1` integration type, `$2` search pattern, `$3` category.
const ACTIVE_VIDEO_FILTER: &str = r#"
    status = 'active'
    AND ($1::text IS NULL OR integration_type = $1)
    AND ($2::text IS NULL OR video_id ILIKE $2 OR title ILIKE $2 OR description ILIKE $2)
    AND ($3::text IS NULL OR category = $3)
"#;

// ============================================================================
// Code Repository Implementation
// ============================================================================

impl CodeRepository for PgAccessRepository {
    async fn create(&self, code: &RedemptionCode) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO redemption_codes (
                code_id,
                code,
                sealed_token,
                duration_minutes,
                status,
                max_uses,
                current_uses,
                expires_at,
                ip_restrictions,
                description,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(code.code_id)
        .bind(code.code.as_str())
        .bind(&code.sealed_token)
        .bind(code.duration_minutes)
        .bind(code.status.code())
        .bind(code.max_uses)
        .bind(code.current_uses)
        .bind(code.expires_at)
        .bind(code.ip_restrictions.as_ref().map(|list| list.as_str()))
        .bind(&code.description)
        .bind(code.created_at)
        .bind(code.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AccessError::CodeTaken
            } else {
                AccessError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find_by_code(&self, code: &CodeValue) -> AccessResult<Option<RedemptionCode>> {
        let row = sqlx::query_as::<_, CodeRow>(&format!(
            "SELECT {CODE_COLUMNS} FROM redemption_codes WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_code()).transpose()
    }

    async fn list(&self, filter: &CodeFilter) -> AccessResult<Vec<RedemptionCode>> {
        let rows = sqlx::query_as::<_, CodeRow>(&format!(
            r#"
            SELECT {CODE_COLUMNS}
            FROM redemption_codes
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR code ILIKE $2 OR description ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.status.map(|s| s.code()))
        .bind(filter.search.as_deref().map(contains_pattern))
        .bind(limit_arg(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_code()).collect()
    }

    async fn record_redemption(&self, code: &CodeValue, now: DateTime<Utc>) -> AccessResult<bool> {
        let updated = sqlx::query(RECORD_REDEMPTION_SQL)
            .bind(code.as_str())
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(updated == 1)
    }

    async fn update(&self, code: &RedemptionCode) -> AccessResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE redemption_codes SET
                duration_minutes = $2,
                max_uses = $3,
                expires_at = $4,
                ip_restrictions = $5,
                description = $6,
                updated_at = $7
            WHERE code = $1
            "#,
        )
        .bind(code.code.as_str())
        .bind(code.duration_minutes)
        .bind(code.max_uses)
        .bind(code.expires_at)
        .bind(code.ip_restrictions.as_ref().map(|list| list.as_str()))
        .bind(&code.description)
        .bind(code.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn set_status(
        &self,
        code: &CodeValue,
        status: CodeStatus,
        now: DateTime<Utc>,
    ) -> AccessResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE redemption_codes SET
                status = $2,
                current_uses = CASE WHEN $2 = 'active' THEN 0 ELSE current_uses END,
                updated_at = $3
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .bind(status.code())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn delete(&self, code: &CodeValue) -> AccessResult<bool> {
        let deleted = sqlx::query("DELETE FROM redemption_codes WHERE code = $1")
            .bind(code.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn stats(&self) -> AccessResult<CodeStats> {
        let row = sqlx::query_as::<_, CodeStatsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'active') AS active,
                COUNT(*) FILTER (WHERE status = 'used') AS used,
                COUNT(*) FILTER (WHERE status = 'expired') AS expired,
                COUNT(*) FILTER (WHERE status = 'disabled') AS disabled
            FROM redemption_codes
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_stats())
    }
}

/// Single-statement conditional increment. The WHERE clause is re-checked
/// under the row lock, so concurrent redemptions can never pass the cap.
const RECORD_REDEMPTION_SQL: &str = r#"
    UPDATE redemption_codes SET
        current_uses = current_uses + 1,
        status = CASE
            WHEN max_uses > 0 AND current_uses + 1 >= max_uses THEN 'used'
            ELSE status
        END,
        updated_at = $2
    WHERE code = $1
      AND status = 'active'
      AND (max_uses = 0 OR current_uses < max_uses)
      AND (expires_at IS NULL OR expires_at > $2)
"#;

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAccessRepository {
    async fn create(&self, session: &Session) -> AccessResult<()> {
        insert_session(&self.pool, session).await
    }

    async fn find_live(
        &self,
        token_digest: &[u8; 32],
        now: DateTime<Utc>,
    ) -> AccessResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM access_sessions
            WHERE token_digest = $1
              AND status = 'active'
              AND expires_at > $2
            "#
        ))
        .bind(&token_digest[..])
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_session()).transpose()
    }

    async fn invalidate(&self, token_digest: &[u8; 32]) -> AccessResult<Option<Uuid>> {
        let session_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE access_sessions SET status = 'invalidated'
            WHERE token_digest = $1 AND status = 'active'
            RETURNING session_id
            "#,
        )
        .bind(&token_digest[..])
        .fetch_optional(&self.pool)
        .await?;

        Ok(session_id)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> AccessResult<u64> {
        let swept = sqlx::query(
            "UPDATE access_sessions SET status = 'expired' WHERE status = 'active' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(swept)
    }
}

async fn insert_session<'e, E>(executor: E, session: &Session) -> AccessResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO access_sessions (
            session_id,
            token_digest,
            code,
            client_ip,
            user_agent,
            duration_minutes,
            status,
            expires_at,
            created_at
        ) VALUES ($1, $2, $3, $4::inet, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(session.session_id)
    .bind(&session.token_digest[..])
    .bind(session.code.as_str())
    .bind(session.client_ip.to_string())
    .bind(&session.user_agent)
    .bind(session.duration_minutes)
    .bind(session.status.code())
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(executor)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AccessError::TokenCollision
        } else {
            AccessError::Database(e)
        }
    })?;

    Ok(())
}

// ============================================================================
// Redemption Unit of Work Implementation
// ============================================================================

impl RedemptionUnitOfWork for PgAccessRepository {
    async fn redeem(
        &self,
        code: &CodeValue,
        session: &Session,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(RECORD_REDEMPTION_SQL)
            .bind(code.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            let row = sqlx::query_as::<_, CodeRow>(&format!(
                "SELECT {CODE_COLUMNS} FROM redemption_codes WHERE code = $1"
            ))
            .bind(code.as_str())
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            let rejection = match row {
                None => CodeRejection::NotFound,
                Some(row) => row
                    .into_code()?
                    .check_redeemable(now, session.client_ip)
                    .err()
                    .unwrap_or(CodeRejection::UsageLimit),
            };
            return Err(AccessError::CodeRejected(rejection));
        }

        // Dropping the transaction on error rolls the increment back
        insert_session(&mut *tx, session).await?;
        tx.commit().await?;

        Ok(())
    }
}

// ============================================================================
// Video Repository Implementation
// ============================================================================

impl VideoRepository for PgAccessRepository {
    async fn create(&self, video: &ProtectedVideo) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO protected_videos (
                video_id,
                title,
                required_minutes,
                integration_type,
                provider_ref,
                direct_url,
                description,
                category,
                status,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&video.video_id)
        .bind(&video.title)
        .bind(video.required_minutes)
        .bind(&video.integration_type)
        .bind(&video.provider_ref)
        .bind(&video.direct_url)
        .bind(&video.description)
        .bind(&video.category)
        .bind(video.status.code())
        .bind(video.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AccessError::VideoTaken
            } else {
                AccessError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn find_by_video_id(&self, video_id: &str) -> AccessResult<Option<ProtectedVideo>> {
        let row = sqlx::query_as::<_, VideoRow>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM protected_videos WHERE video_id = $1"
        ))
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_video()).transpose()
    }

    async fn list_active(&self, filter: &VideoFilter) -> AccessResult<Vec<ProtectedVideo>> {
        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM protected_videos
            WHERE {ACTIVE_VIDEO_FILTER}
            ORDER BY title ASC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.integration_type.as_deref())
        .bind(filter.search.as_deref().map(contains_pattern))
        .bind(filter.category.as_deref())
        .bind(limit_arg(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_video()).collect()
    }

    async fn count_active(&self, filter: &VideoFilter) -> AccessResult<u64> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM protected_videos WHERE {ACTIVE_VIDEO_FILTER}"
        ))
        .bind(filter.integration_type.as_deref())
        .bind(filter.search.as_deref().map(contains_pattern))
        .bind(filter.category.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(total.max(0) as u64)
    }
}

// ============================================================================
// Analytics Repository Implementation
// ============================================================================

impl AnalyticsRepository for PgAccessRepository {
    async fn record(&self, event: &AnalyticsEvent) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO analytics_events (
                event_type,
                object_type,
                object_id,
                ip_address,
                user_agent,
                metadata,
                created_at
            ) VALUES ($1, $2, $3, $4::inet, $5, $6, $7)
            "#,
        )
        .bind(event.event_type.code())
        .bind(event.object_type)
        .bind(&event.object_id)
        .bind(event.ip_address.map(|ip| ip.to_string()))
        .bind(&event.user_agent)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> AccessResult<u64> {
        let deleted = sqlx::query("DELETE FROM analytics_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct CodeRow {
    code_id: Uuid,
    code: String,
    sealed_token: String,
    duration_minutes: i32,
    status: String,
    max_uses: i32,
    current_uses: i32,
    expires_at: Option<DateTime<Utc>>,
    ip_restrictions: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CodeRow {
    fn into_code(self) -> AccessResult<RedemptionCode> {
        let status = CodeStatus::from_code(&self.status)
            .ok_or_else(|| AccessError::Internal(format!("Invalid code status: {}", self.status)))?;

        Ok(RedemptionCode {
            code_id: self.code_id,
            code: CodeValue::from_stored(self.code),
            sealed_token: self.sealed_token,
            duration_minutes: self.duration_minutes,
            status,
            max_uses: self.max_uses,
            current_uses: self.current_uses,
            expires_at: self.expires_at,
            ip_restrictions: self
                .ip_restrictions
                .as_deref()
                .and_then(IpAllowList::from_stored),
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CodeStatsRow {
    total: i64,
    active: i64,
    used: i64,
    expired: i64,
    disabled: i64,
}

impl CodeStatsRow {
    fn into_stats(self) -> CodeStats {
        CodeStats {
            total: self.total.max(0) as u64,
            active: self.active.max(0) as u64,
            used: self.used.max(0) as u64,
            expired: self.expired.max(0) as u64,
            disabled: self.disabled.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    token_digest: Vec<u8>,
    code: String,
    client_ip: String,
    user_agent: Option<String>,
    duration_minutes: i32,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> AccessResult<Session> {
        let token_digest: [u8; 32] = self
            .token_digest
            .as_slice()
            .try_into()
            .map_err(|_| AccessError::Internal("Invalid session token digest length".to_string()))?;
        let client_ip: IpAddr = self.client_ip.parse().map_err(|_| {
            AccessError::Internal(format!("Invalid session client IP: {}", self.client_ip))
        })?;
        let status = SessionStatus::from_code(&self.status).ok_or_else(|| {
            AccessError::Internal(format!("Invalid session status: {}", self.status))
        })?;

        Ok(Session {
            session_id: self.session_id,
            token_digest,
            code: CodeValue::from_stored(self.code),
            client_ip,
            user_agent: self.user_agent,
            duration_minutes: self.duration_minutes,
            status,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    video_id: String,
    title: String,
    required_minutes: i32,
    integration_type: String,
    provider_ref: Option<String>,
    direct_url: Option<String>,
    description: Option<String>,
    category: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl VideoRow {
    fn into_video(self) -> AccessResult<ProtectedVideo> {
        let status = VideoStatus::from_code(&self.status)
            .ok_or_else(|| AccessError::Internal(format!("Invalid video status: {}", self.status)))?;

        Ok(ProtectedVideo {
            video_id: self.video_id,
            title: self.title,
            required_minutes: self.required_minutes,
            integration_type: self.integration_type,
            provider_ref: self.provider_ref,
            direct_url: self.direct_url,
            description: self.description,
            category: self.category,
            status,
            created_at: self.created_at,
        })
    }
}
