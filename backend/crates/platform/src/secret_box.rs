//! Secret Box
//!
//! Authenticated symmetric encryption for secrets stored at rest.
//!
//! Stored values carry an explicit format tag. The only format today is
//! `v1:` followed by base64 of `nonce (12 bytes) || ciphertext || tag`,
//! produced by AES-256-GCM with the format tag bound as associated data.
//! Values without a recognized tag are rejected, never passed through.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, from_base64, to_base64, try_random_bytes};

const FORMAT_V1: &str = "v1";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// AES-256-GCM cipher for stored secrets
#[derive(Clone)]
pub struct SecretCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Cipher with a fresh random key (tests and throwaway environments)
    pub fn random() -> Result<Self, CryptoError> {
        let bytes = try_random_bytes(KEY_LEN)?;
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Load the key from `path`, creating and persisting a new one on first use.
    pub fn load_or_create(path: &Path) -> Result<Self, CryptoError> {
        Ok(Self::new(load_or_create_key(path)?))
    }

    /// Encrypt a secret with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce_bytes = try_random_bytes(NONCE_LEN)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]));

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: FORMAT_V1.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = nonce_bytes;
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{}:{}", FORMAT_V1, to_base64(&sealed)))
    }

    /// Decrypt a value produced by [`SecretCipher::encrypt`].
    ///
    /// ## Errors
    /// * `UnsupportedFormat` - the value has no known format tag
    /// * `Malformed` - bad encoding, truncated input or failed authentication
    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let (tag, body) = stored
            .split_once(':')
            .ok_or(CryptoError::UnsupportedFormat)?;
        if tag != FORMAT_V1 {
            return Err(CryptoError::UnsupportedFormat);
        }

        let sealed = from_base64(body).map_err(|_| CryptoError::Malformed)?;
        if sealed.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]));
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: FORMAT_V1.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Malformed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Malformed)
    }
}

/// Read a hex-encoded 32-byte key from `path`, generating it if absent.
///
/// The file is created with `create_new` so two processes racing on first
/// start end up sharing whichever key was written first.
pub fn load_or_create_key(path: &Path) -> Result<[u8; KEY_LEN], CryptoError> {
    match read_key(path) {
        Ok(key) => return Ok(key),
        Err(CryptoError::KeyStorage(e)) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = Zeroizing::new(try_random_bytes(KEY_LEN)?);
    let encoded = Zeroizing::new(hex::encode(bytes.as_slice()));

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return read_key(path),
        Err(e) => return Err(e.into()),
    };
    restrict_permissions(&file)?;
    file.write_all(encoded.as_bytes())?;
    file.sync_all()?;

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn read_key(path: &Path) -> Result<[u8; KEY_LEN], CryptoError> {
    let contents = Zeroizing::new(fs::read_to_string(path)?);
    let bytes = Zeroizing::new(hex::decode(contents.trim()).map_err(|_| CryptoError::InvalidKey)?);
    if bytes.len() != KEY_LEN {
        return Err(CryptoError::InvalidKey);
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}
