//! Access Session Entity
//!
//! A server-held record binding one successful redemption to a client
//! address and an expiry. The session refers to its code by value only;
//! deleting or disabling the code leaves issued sessions untouched.

use chrono::{DateTime, Duration, Utc};
use platform::client::ClientContext;
use platform::crypto::constant_time_eq;
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::entity::redemption_code::RedemptionCode;
use crate::domain::value_object::{
    code_value::CodeValue, session_status::SessionStatus, session_token::SessionToken,
};

/// Access session entity
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID (UUID v4), safe to log
    pub session_id: Uuid,
    /// SHA-256 of the cookie token
    pub token_digest: [u8; 32],
    /// Code that produced this session
    pub code: CodeValue,
    /// Address observed at creation
    pub client_ip: IpAddr,
    pub user_agent: Option<String>,
    /// Minutes granted by the code at redemption time
    pub duration_minutes: i32,
    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Build a new session for `code`, expiring `duration_minutes` from `now`
    pub fn issue(
        code: &RedemptionCode,
        client: &ClientContext,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            token_digest: token.digest(),
            code: code.code.clone(),
            client_ip: client.ip.to_canonical(),
            user_agent: client.user_agent.clone(),
            duration_minutes: code.duration_minutes,
            status: SessionStatus::Active,
            expires_at: now + Duration::minutes(i64::from(code.duration_minutes)),
            created_at: now,
        }
    }

    /// Active and not past expiry; does not rely on the sweep having run
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && self.expires_at > now
    }

    /// Constant-time exact match of the requesting address against the
    /// bound one. Subnet neighbours do not match.
    pub fn is_bound_to(&self, ip: IpAddr) -> bool {
        let bound = self.client_ip.to_canonical().to_string();
        let presented = ip.to_canonical().to_string();
        constant_time_eq(bound.as_bytes(), presented.as_bytes())
    }

    /// Whole minutes left, zero once expired
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_minutes().max(0)
    }
}
