//! Redemption Code Entity
//!
//! A credential exchanged for a time-boxed access grant.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::value_object::{
    code_rejection::CodeRejection, code_status::CodeStatus, code_value::CodeValue,
    ip_allow_list::IpAllowList,
};

/// Redemption code entity
#[derive(Debug, Clone)]
pub struct RedemptionCode {
    pub code_id: Uuid,
    /// Normalized code value, unique
    pub code: CodeValue,
    /// Secure token, encrypted at rest (`platform::secret_box` format)
    pub sealed_token: String,
    /// Minutes granted to each session created from this code
    pub duration_minutes: i32,
    pub status: CodeStatus,
    /// Usage cap; 0 means unlimited
    pub max_uses: i32,
    pub current_uses: i32,
    /// Absolute validity deadline, independent of usage
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_restrictions: Option<IpAllowList>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedemptionCode {
    /// Whether the validity deadline has passed
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Whether the usage cap is reached
    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.current_uses >= self.max_uses
    }

    pub fn allows_ip(&self, ip: IpAddr) -> bool {
        self.ip_restrictions
            .as_ref()
            .is_none_or(|list| list.contains(ip))
    }

    /// Run the redemption checks in order: expiry, IP restriction, status,
    /// usage cap. The first failure wins.
    pub fn check_redeemable(&self, now: DateTime<Utc>, ip: IpAddr) -> Result<(), CodeRejection> {
        if self.is_past_deadline(now) {
            return Err(CodeRejection::Expired);
        }
        if !self.allows_ip(ip) {
            return Err(CodeRejection::IpRestricted);
        }
        if let Some(rejection) = self.status.rejection() {
            return Err(rejection);
        }
        if self.is_exhausted() {
            return Err(CodeRejection::UsageLimit);
        }
        Ok(())
    }

    /// Count one redemption, flipping to `Used` when the cap is reached.
    ///
    /// Returns `false` and leaves the code untouched when it is not
    /// redeemable. Storage backends must apply the same rule atomically.
    pub fn record_use(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != CodeStatus::Active || self.is_exhausted() || self.is_past_deadline(now)
        {
            return false;
        }
        self.current_uses += 1;
        if self.is_exhausted() {
            self.status = CodeStatus::Used;
        }
        self.updated_at = now;
        true
    }

    /// Admin transition; re-activating also clears the usage counter
    pub fn set_status(&mut self, status: CodeStatus, now: DateTime<Utc>) {
        if status == CodeStatus::Active {
            self.current_uses = 0;
        }
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(max_uses: i32) -> RedemptionCode {
        let now = Utc::now();
        RedemptionCode {
            code_id: Uuid::new_v4(),
            code: CodeValue::from_stored("PROMO01".to_string()),
            sealed_token: "v1:sealed".to_string(),
            duration_minutes: 60,
            status: CodeStatus::Active,
            max_uses,
            current_uses: 0,
            expires_at: None,
            ip_restrictions: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_use_flips_to_used_at_cap() {
        let now = Utc::now();
        let mut code = code(2);

        assert!(code.record_use(now));
        assert_eq!(code.status, CodeStatus::Active);
        assert!(code.record_use(now));
        assert_eq!(code.status, CodeStatus::Used);
        assert_eq!(code.current_uses, 2);
        assert!(!code.record_use(now));
        assert_eq!(code.current_uses, 2);
    }

    #[test]
    fn test_unlimited_code_never_exhausts() {
        let now = Utc::now();
        let mut code = code(0);
        for _ in 0..100 {
            assert!(code.record_use(now));
        }
        assert_eq!(code.status, CodeStatus::Active);
        assert!(code.check_redeemable(now, ip("1.1.1.1")).is_ok());
    }

    #[test]
    fn test_check_order_expiry_before_ip_before_status() {
        let now = Utc::now();
        let mut code = code(1);
        code.expires_at = Some(now - Duration::minutes(1));
        code.ip_restrictions = IpAllowList::parse("10.0.0.1").unwrap();
        code.status = CodeStatus::Disabled;

        assert_eq!(
            code.check_redeemable(now, ip("192.0.2.1")),
            Err(CodeRejection::Expired)
        );

        code.expires_at = None;
        assert_eq!(
            code.check_redeemable(now, ip("192.0.2.1")),
            Err(CodeRejection::IpRestricted)
        );
        assert_eq!(
            code.check_redeemable(now, ip("10.0.0.1")),
            Err(CodeRejection::Inactive)
        );
    }

    #[test]
    fn test_reactivation_resets_usage() {
        let now = Utc::now();
        let mut code = code(1);
        code.record_use(now);
        assert_eq!(code.status, CodeStatus::Used);

        code.set_status(CodeStatus::Active, now);
        assert_eq!(code.current_uses, 0);
        assert!(code.check_redeemable(now, ip("1.1.1.1")).is_ok());
    }
}
