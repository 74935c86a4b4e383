//! Redemption Code Status

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_object::code_rejection::CodeRejection;

/// Lifecycle state of a redemption code
///
/// `Used`, `Expired` and `Disabled` are terminal until an administrator
/// resets the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    #[default]
    Active,
    Used,
    Expired,
    Disabled,
}

impl CodeStatus {
    pub const ALL: [CodeStatus; 4] = [
        CodeStatus::Active,
        CodeStatus::Used,
        CodeStatus::Expired,
        CodeStatus::Disabled,
    ];

    /// Get string code for storage/API
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
        }
    }

    /// Create from string code
    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(Self::Active),
            "used" => Some(Self::Used),
            "expired" => Some(Self::Expired),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Rejection reported for a code in this state, `None` when redeemable
    #[inline]
    pub const fn rejection(&self) -> Option<CodeRejection> {
        match self {
            Self::Active => None,
            Self::Used => Some(CodeRejection::UsageLimit),
            Self::Expired => Some(CodeRejection::Expired),
            Self::Disabled => Some(CodeRejection::Inactive),
        }
    }
}

impl fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for status in CodeStatus::ALL {
            assert_eq!(CodeStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(CodeStatus::from_code("ACTIVE"), None);
    }

    #[test]
    fn test_rejection_per_status() {
        assert_eq!(CodeStatus::Active.rejection(), None);
        assert_eq!(CodeStatus::Used.rejection(), Some(CodeRejection::UsageLimit));
        assert_eq!(CodeStatus::Expired.rejection(), Some(CodeRejection::Expired));
        assert_eq!(CodeStatus::Disabled.rejection(), Some(CodeRejection::Inactive));
    }
}
