//! CSRF proofs
//!
//! Stateless, action-scoped tokens: `base64url(nonce || issued_at_ms)` and an
//! HMAC-SHA256 tag over the action name and that payload, joined by `.`.

use std::sync::Arc;

use chrono::Duration;
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::crypto::{
    CryptoError, constant_time_eq, from_base64_url, hmac_sha256, to_base64_url, try_random_bytes,
};

const NONCE_LEN: usize = 16;
const PAYLOAD_LEN: usize = NONCE_LEN + 8;
const MAX_CLOCK_SKEW_MS: i64 = 60_000;

/// Request header carrying the proof
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Why a proof was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfError {
    #[error("CSRF token missing")]
    Missing,
    #[error("CSRF token malformed")]
    Malformed,
    #[error("CSRF token signature mismatch")]
    BadSignature,
    #[error("CSRF token expired")]
    Expired,
}

/// Issues and verifies CSRF proofs
pub struct CsrfGuard {
    secret: Zeroizing<[u8; 32]>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CsrfGuard {
    pub fn new(secret: [u8; 32], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: Zeroizing::new(secret),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a proof bound to `action`
    pub fn issue(&self, action: &str) -> Result<String, CryptoError> {
        let mut payload = try_random_bytes(NONCE_LEN)?;
        payload.extend_from_slice(&self.clock.now_ms().to_be_bytes());

        let tag = self.sign(action, &payload);
        Ok(format!("{}.{}", to_base64_url(&payload), to_base64_url(&tag)))
    }

    /// Verify a proof for `action`
    pub fn verify(&self, action: &str, token: Option<&str>) -> Result<(), CsrfError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let token = token.ok_or(CsrfError::Missing)?;

        let (payload_b64, tag_b64) = token.split_once('.').ok_or(CsrfError::Malformed)?;
        let payload = from_base64_url(payload_b64).map_err(|_| CsrfError::Malformed)?;
        let tag = from_base64_url(tag_b64).map_err(|_| CsrfError::Malformed)?;
        if payload.len() != PAYLOAD_LEN {
            return Err(CsrfError::Malformed);
        }

        if !constant_time_eq(&self.sign(action, &payload), &tag) {
            return Err(CsrfError::BadSignature);
        }

        let mut issued = [0u8; 8];
        issued.copy_from_slice(&payload[NONCE_LEN..]);
        let issued_at_ms = i64::from_be_bytes(issued);

        let now = self.clock.now_ms();
        if issued_at_ms > now + MAX_CLOCK_SKEW_MS
            || now - issued_at_ms > self.ttl.num_milliseconds()
        {
            return Err(CsrfError::Expired);
        }

        Ok(())
    }

    fn sign(&self, action: &str, payload: &[u8]) -> [u8; 32] {
        let mut message = Vec::with_capacity(action.len() + 1 + payload.len());
        message.extend_from_slice(action.as_bytes());
        message.push(0);
        message.extend_from_slice(payload);
        hmac_sha256(&self.secret[..], &message)
    }
}
