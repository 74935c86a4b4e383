//! Code Rejection
//!
//! Why a redemption code was refused. Each reason is logged as its own
//! event so brute-force guessing (`not_found`) stays distinguishable from
//! expiry or misuse.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeRejection {
    /// No code with this value
    NotFound,
    /// Past its validity deadline, or marked expired
    Expired,
    /// Client IP is outside the code's allow-list
    IpRestricted,
    /// Disabled by an administrator
    Inactive,
    /// Usage cap reached
    UsageLimit,
}

impl CodeRejection {
    /// Stable reason code for logs and analytics
    #[inline]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::IpRestricted => "ip_restricted",
            Self::Inactive => "inactive",
            Self::UsageLimit => "usage_limit",
        }
    }

    #[inline]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "Invalid code.",
            Self::Expired => "This code has expired.",
            Self::IpRestricted => "This code is not available from your location.",
            Self::Inactive => "This code is not active.",
            Self::UsageLimit => "This code has reached its usage limit.",
        }
    }
}

impl fmt::Display for CodeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}
