//! Code Value
//!
//! The normalized identity of a redemption code.

use derive_more::Display;
use platform::crypto::try_random_bytes;
use serde::Serialize;

use crate::error::{AccessError, AccessResult};

/// Characters used by the generator; excludes look-alikes `I`, `O`, `0`, `1`
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Normalized redemption code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(transparent)]
pub struct CodeValue(String);

impl CodeValue {
    /// Maximum accepted length in characters
    pub const MAX_LEN: usize = 50;

    /// Parse user input: trim, upper-case unless codes are configured as
    /// case sensitive, then bound the length of the stored form.
    ///
    /// Codes are ASCII letters and digits, optionally separated by `-` or `_`.
    pub fn parse(raw: &str, case_sensitive: bool) -> AccessResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AccessError::InvalidInput("A code is required.".to_string()));
        }
        if !trimmed.chars().all(is_code_char) {
            return Err(AccessError::InvalidInput(
                "The code contains invalid characters.".to_string(),
            ));
        }

        let value = if case_sensitive {
            trimmed.to_string()
        } else {
            trimmed.to_ascii_uppercase()
        };
        if value.chars().count() > Self::MAX_LEN {
            return Err(AccessError::InvalidInput("The code is too long.".to_string()));
        }
        Ok(Self(value))
    }

    /// Wrap a value read back from storage
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Shape of generated codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFormat {
    pub length: usize,
    pub prefix: String,
    pub suffix: String,
}

impl Default for CodeFormat {
    fn default() -> Self {
        Self {
            length: 8,
            prefix: String::new(),
            suffix: String::new(),
        }
    }
}

/// Generate a random code body from [`CODE_ALPHABET`] wrapped in the
/// format's prefix and suffix.
///
/// The alphabet has 32 symbols so `byte % 32` is unbiased.
pub fn generate_code(format: &CodeFormat) -> AccessResult<String> {
    if format.length == 0 {
        return Err(AccessError::InvalidInput(
            "Code length must be positive.".to_string(),
        ));
    }
    let total = format.prefix.chars().count() + format.length + format.suffix.chars().count();
    if total > CodeValue::MAX_LEN {
        return Err(AccessError::InvalidInput("The code is too long.".to_string()));
    }

    let body: String = try_random_bytes(format.length)?
        .into_iter()
        .map(|b| CODE_ALPHABET[(b % 32) as usize] as char)
        .collect();

    Ok(format!("{}{}{}", format.prefix, body, format.suffix))
}
