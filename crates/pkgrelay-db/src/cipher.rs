//! Symmetric sealing for cached credentials.
//!
//! Tokens are sealed with ChaCha20-Poly1305 under a per-installation key
//! kept in a separate file next to the database. The stored form is
//! `base64(nonce || ciphertext)`.

use std::fs;
use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Errors from key handling and sealing.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Reading or writing the key file failed.
    #[error("key file error: {0}")]
    KeyFile(#[from] std::io::Error),

    /// The key file does not hold a valid key.
    #[error("key file is malformed")]
    MalformedKey,

    /// The sealed value is not valid base64 or is too short.
    #[error("sealed value is malformed")]
    MalformedSealed,

    /// Authentication failed: wrong key or tampered data.
    #[error("sealed value could not be opened")]
    OpenFailed,

    /// Encryption failed.
    #[error("sealing failed")]
    SealFailed,
}

/// Seals and opens credential tokens.
#[derive(Clone)]
pub struct TokenCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl TokenCipher {
    /// Create a cipher with a fresh random key.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        Self { key }
    }

    /// Create a cipher from raw key bytes.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Load the key at `path`, creating it if it does not exist.
    ///
    /// New key files are written with owner-only permissions on unix.
    pub fn load_or_create(path: &Path) -> Result<Self, CipherError> {
        if path.exists() {
            let encoded = Zeroizing::new(fs::read_to_string(path)?);
            let decoded = Zeroizing::new(
                STANDARD
                    .decode(encoded.trim())
                    .map_err(|_| CipherError::MalformedKey)?,
            );
            let key: [u8; KEY_LEN] = decoded
                .as_slice()
                .try_into()
                .map_err(|_| CipherError::MalformedKey)?;
            return Ok(Self::from_key(key));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let cipher = Self::generate();
        let encoded = Zeroizing::new(STANDARD.encode(&cipher.key[..]));
        let mut file = open_new_key_file(path)?;
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;

        tracing::info!(
            target: "pkgrelay.credentials",
            path = %path.display(),
            "Created credential cache key"
        );
        Ok(cipher)
    }

    /// Encrypt `plaintext` under a random nonce.
    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        let aead = ChaCha20Poly1305::new(Key::from_slice(&self.key[..]));
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::SealFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt a value produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &str) -> Result<String, CipherError> {
        let raw = STANDARD
            .decode(sealed)
            .map_err(|_| CipherError::MalformedSealed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::MalformedSealed);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

        let aead = ChaCha20Poly1305::new(Key::from_slice(&self.key[..]));
        let plaintext = Zeroizing::new(
            aead.decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| CipherError::OpenFailed)?,
        );
        String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::OpenFailed)
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(<key>)")
    }
}

#[cfg(unix)]
fn open_new_key_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_new_key_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}
