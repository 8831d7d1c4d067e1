//! AES-256-GCM symmetric encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use trustcore_core::{TrustError, TrustResult};

/// AES-256 key length.
pub const KEY_LEN: usize = 32;
/// GCM nonce length.
pub const IV_LEN: usize = 12;

/// Used by [`AesSymmetricProvider::context_key`] when no secret is configured.
/// Must never back a production deployment.
const FALLBACK_CONTEXT_SECRET: &str = "trustcore-insecure-fallback-context-secret";

/// Turns caller-supplied key bytes into an AES-256 key.
pub trait KeyStretch: Send + Sync + core::fmt::Debug {
    fn stretch(&self, key: &[u8]) -> TrustResult<Zeroizing<[u8; KEY_LEN]>>;
}

/// Repeats the key until it is 32 bytes long, then truncates.
///
/// Reproduces the key derivation of earlier deployments so the same
/// configured key material yields the same AES key. It does not make old
/// ciphertext readable: that was written in a different AES mode, while this
/// provider is AES-256-GCM with a 12-byte IV and an appended tag, so there is
/// no byte-level interop with it. This is not a KDF either: a short key keeps
/// its low entropy. Prefer [`HkdfKeyStretch`] for new data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TilingKeyStretch;

impl KeyStretch for TilingKeyStretch {
    fn stretch(&self, key: &[u8]) -> TrustResult<Zeroizing<[u8; KEY_LEN]>> {
        if key.is_empty() {
            return Err(TrustError::invalid_argument("encryption key is empty"));
        }
        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        for (slot, byte) in out.iter_mut().zip(key.iter().cycle()) {
            *slot = *byte;
        }
        Ok(out)
    }
}

/// HKDF-SHA256 expansion of the supplied key material.
#[derive(Debug, Clone, Default)]
pub struct HkdfKeyStretch {
    info: Vec<u8>,
}

impl HkdfKeyStretch {
    pub fn new(info: impl Into<Vec<u8>>) -> Self {
        Self { info: info.into() }
    }
}

impl KeyStretch for HkdfKeyStretch {
    fn stretch(&self, key: &[u8]) -> TrustResult<Zeroizing<[u8; KEY_LEN]>> {
        if key.is_empty() {
            return Err(TrustError::invalid_argument("encryption key is empty"));
        }
        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        Hkdf::<Sha256>::new(None, key)
            .expand(&self.info, &mut out[..])
            .map_err(|e| TrustError::crypto(format!("key expansion failed: {e}")))?;
        Ok(out)
    }
}

pub trait SymmetricCryptoProvider: Send + Sync {
    fn encrypt(&self, data: &[u8], key: &[u8], iv: &[u8]) -> TrustResult<Vec<u8>>;

    fn decrypt(&self, data: &[u8], key: &[u8], iv: &[u8]) -> TrustResult<Vec<u8>>;

    fn generate_key(&self) -> Vec<u8>;

    fn generate_iv(&self) -> Vec<u8>;

    /// Process-default key derived from the configured context secret.
    fn context_key(&self) -> Zeroizing<[u8; KEY_LEN]>;
}

/// AES-256-GCM with a caller-supplied 12-byte IV. Ciphertext carries the
/// 16-byte authentication tag at the end.
#[derive(Clone)]
pub struct AesSymmetricProvider<S = TilingKeyStretch> {
    stretch: S,
    context_secret: Option<Zeroizing<String>>,
}

impl AesSymmetricProvider<TilingKeyStretch> {
    pub fn new(context_secret: Option<String>) -> Self {
        Self::with_stretch(TilingKeyStretch, context_secret)
    }
}

impl<S: KeyStretch> AesSymmetricProvider<S> {
    pub fn with_stretch(stretch: S, context_secret: Option<String>) -> Self {
        Self {
            stretch,
            context_secret: context_secret.filter(|s| !s.is_empty()).map(Zeroizing::new),
        }
    }

    /// Whether [`context_key`](SymmetricCryptoProvider::context_key) falls back
    /// to the built-in secret.
    pub fn uses_fallback_context_secret(&self) -> bool {
        self.context_secret.is_none()
    }

    fn cipher(&self, key: &[u8]) -> TrustResult<Aes256Gcm> {
        let key = self.stretch.stretch(key)?;
        Aes256Gcm::new_from_slice(&key[..]).map_err(|e| TrustError::crypto(format!("invalid AES key: {e}")))
    }
}

impl<S: core::fmt::Debug> core::fmt::Debug for AesSymmetricProvider<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesSymmetricProvider")
            .field("stretch", &self.stretch)
            .field("context_secret", &self.context_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn check_iv(iv: &[u8]) -> TrustResult<&Nonce<<Aes256Gcm as aes_gcm::AeadCore>::NonceSize>> {
    if iv.len() != IV_LEN {
        return Err(TrustError::invalid_argument(format!(
            "IV must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }
    Ok(Nonce::from_slice(iv))
}

impl<S: KeyStretch> SymmetricCryptoProvider for AesSymmetricProvider<S> {
    fn encrypt(&self, data: &[u8], key: &[u8], iv: &[u8]) -> TrustResult<Vec<u8>> {
        let nonce = check_iv(iv)?;
        self.cipher(key)?
            .encrypt(nonce, data)
            .map_err(|e| TrustError::crypto(format!("encryption failed: {e}")))
    }

    fn decrypt(&self, data: &[u8], key: &[u8], iv: &[u8]) -> TrustResult<Vec<u8>> {
        let nonce = check_iv(iv)?;
        self.cipher(key)?
            .decrypt(nonce, data)
            .map_err(|e| TrustError::crypto(format!("decryption failed: {e}")))
    }

    fn generate_key(&self) -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn generate_iv(&self) -> Vec<u8> {
        let mut iv = vec![0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        iv
    }

    fn context_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        let secret = match &self.context_secret {
            Some(secret) => secret.as_str(),
            None => {
                tracing::warn!("no context secret configured; deriving context key from insecure fallback");
                FALLBACK_CONTEXT_SECRET
            }
        };
        Zeroizing::new(Sha256::digest(secret.as_bytes()).into())
    }
}
