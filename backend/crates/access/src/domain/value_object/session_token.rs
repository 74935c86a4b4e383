//! Session Token
//!
//! The opaque secret delivered in the session cookie. Only its SHA-256
//! digest is persisted.

use platform::crypto::{generate_token, sha256};
use std::fmt;

use crate::error::AccessResult;

/// Random bytes per token (hex encoded to twice as many characters)
pub const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token from the OS CSPRNG
    pub fn generate() -> AccessResult<Self> {
        Ok(Self(generate_token(SESSION_TOKEN_BYTES)?))
    }

    /// Accept a token presented by a client; anything not shaped like a
    /// token is refused without touching storage.
    pub fn from_presented(value: &str) -> Option<Self> {
        let value = value.trim();
        let well_formed = value.len() == SESSION_TOKEN_BYTES * 2
            && value.bytes().all(|b| b.is_ascii_hexdigit());
        well_formed.then(|| Self(value.to_ascii_lowercase()))
    }

    /// Lookup key stored in place of the token
    pub fn digest(&self) -> [u8; 32] {
        sha256(self.0.as_bytes())
    }

    /// Raw value, for the Set-Cookie header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(**redacted**)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_roundtrips_through_presentation() {
        let token = SessionToken::generate().unwrap();
        assert_eq!(token.expose().len(), 64);

        let presented = SessionToken::from_presented(token.expose()).unwrap();
        assert_eq!(presented.digest(), token.digest());
    }

    #[test]
    fn test_from_presented_rejects_malformed() {
        assert!(SessionToken::from_presented("").is_none());
        assert!(SessionToken::from_presented("abc").is_none());
        assert!(SessionToken::from_presented(&"g".repeat(64)).is_none());
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = SessionToken::generate().unwrap();
        assert!(!format!("{:?}", token).contains(token.expose()));
    }
}
