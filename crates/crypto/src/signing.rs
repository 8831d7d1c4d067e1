//! Digital signing and verification with configured keys.
//!
//! RS256 and HS256 digest with SHA-256, RS512 with SHA-512. Asymmetric keys
//! live in certificates resolved from a [`CertificateStore`] once per key; a
//! missing certificate or private key is an error, never an unsigned result.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use once_cell::sync::OnceCell;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use trustcore_core::{TrustError, TrustResult};

use crate::certificate::{Certificate, CertificateStore};
use crate::config::{CertificateReference, DEFAULT_KEY_NAME, SecurityConfig, SigningAlgorithm, SigningKeyConfig};

type HmacSha256 = Hmac<Sha256>;

/// Shortest contextual secret that may replace a configured HMAC secret (128 bits).
pub const MIN_CONTEXT_SECRET_LEN: usize = 16;

enum KeyMaterial {
    Certificate(CertificateReference),
    Secret(Zeroizing<Vec<u8>>),
}

/// A configured signing key. Immutable apart from the certificate cache.
pub struct SigningKeyEntry {
    name: Option<String>,
    algorithm: SigningAlgorithm,
    material: KeyMaterial,
    certificate: OnceCell<Arc<Certificate>>,
}

impl SigningKeyEntry {
    pub fn hmac(name: Option<&str>, secret: impl Into<Vec<u8>>) -> TrustResult<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(TrustError::configuration("HMAC signing secret is empty"));
        }
        Ok(Self {
            name: name.map(str::to_string),
            algorithm: SigningAlgorithm::Hs256,
            material: KeyMaterial::Secret(secret),
            certificate: OnceCell::new(),
        })
    }

    pub fn certificate(
        name: Option<&str>,
        algorithm: SigningAlgorithm,
        reference: CertificateReference,
    ) -> TrustResult<Self> {
        if algorithm.is_symmetric() {
            return Err(TrustError::configuration(format!(
                "{algorithm} cannot be backed by a certificate"
            )));
        }
        Ok(Self {
            name: name.map(str::to_string),
            algorithm,
            material: KeyMaterial::Certificate(reference),
            certificate: OnceCell::new(),
        })
    }

    pub fn from_config(config: &SigningKeyConfig) -> TrustResult<Self> {
        let name = config.key_name.as_deref();
        if config.algorithm.is_symmetric() {
            let secret = config.secret.as_ref().ok_or_else(|| {
                TrustError::configuration(format!("signing key '{}' has no secret", display_name(name)))
            })?;
            Self::hmac(name, secret.as_bytes())
        } else {
            let reference = config.certificate.clone().ok_or_else(|| {
                TrustError::configuration(format!(
                    "signing key '{}' has no certificate reference",
                    display_name(name)
                ))
            })?;
            Self::certificate(name, config.algorithm, reference)
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// The unnamed key, or the one explicitly called "default".
    pub fn is_default(&self) -> bool {
        self.name.as_deref().is_none_or(|n| n == DEFAULT_KEY_NAME)
    }
}

impl core::fmt::Debug for SigningKeyEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let material = match &self.material {
            KeyMaterial::Certificate(reference) => reference.to_string(),
            KeyMaterial::Secret(_) => "<secret>".to_string(),
        };
        f.debug_struct("SigningKeyEntry")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("material", &material)
            .field("certificate_resolved", &self.certificate.get().is_some())
            .finish()
    }
}

fn display_name(name: Option<&str>) -> &str {
    name.unwrap_or(DEFAULT_KEY_NAME)
}

/// The process's signing keys, loaded once at startup.
#[derive(Debug, Default)]
pub struct SigningKeyRegistry {
    entries: Vec<SigningKeyEntry>,
}

impl SigningKeyRegistry {
    pub fn new(entries: Vec<SigningKeyEntry>) -> Self {
        Self { entries }
    }

    pub fn from_config(config: &SecurityConfig) -> TrustResult<Self> {
        let entries = config
            .signing_keys
            .iter()
            .map(SigningKeyEntry::from_config)
            .collect::<TrustResult<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    /// Exact name match; with no name, the default entry.
    pub fn resolve(&self, key_id: Option<&str>) -> Option<&SigningKeyEntry> {
        match key_id {
            Some(name) => self
                .entries
                .iter()
                .find(|e| e.name() == Some(name))
                .or_else(|| (name == DEFAULT_KEY_NAME).then(|| self.default_entry()).flatten()),
            None => self.default_entry(),
        }
    }

    fn default_entry(&self) -> Option<&SigningKeyEntry> {
        self.entries.iter().find(|e| e.is_default())
    }

    pub fn entries(&self) -> impl Iterator<Item = &SigningKeyEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-operation signing state.
///
/// Carries a negotiated session secret which, when long enough, replaces the
/// configured HMAC secret for that operation.
#[derive(Clone, Default)]
pub struct SigningContext {
    session_secret: Option<Zeroizing<Vec<u8>>>,
}

impl SigningContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            session_secret: Some(Zeroizing::new(secret.into())),
        }
    }

    /// The session secret, if it is long enough to be used.
    pub fn usable_session_secret(&self) -> Option<&[u8]> {
        self.session_secret
            .as_deref()
            .map(Vec::as_slice)
            .filter(|s| s.len() >= MIN_CONTEXT_SECRET_LEN)
    }
}

impl core::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningContext")
            .field("session_secret", &self.session_secret.as_ref().map(|s| s.len()))
            .finish()
    }
}

/// Signs and verifies with the configured keys.
pub struct SigningService {
    keys: SigningKeyRegistry,
    certificates: Arc<dyn CertificateStore>,
}

impl SigningService {
    pub fn new(keys: SigningKeyRegistry, certificates: Arc<dyn CertificateStore>) -> Self {
        Self { keys, certificates }
    }

    pub fn keys(&self) -> &SigningKeyRegistry {
        &self.keys
    }

    /// Resolve every certificate now so a broken key fails at startup.
    ///
    /// Verification-only certificates are accepted with a warning.
    pub fn validate_keys(&self) -> TrustResult<()> {
        for entry in self.keys.entries() {
            if let KeyMaterial::Certificate(_) = entry.material {
                let certificate = self.certificate_for(entry)?;
                if !certificate.has_private_key() {
                    tracing::warn!(
                        key = display_name(entry.name()),
                        subject = certificate.subject(),
                        "signing certificate has no private key; key can only verify"
                    );
                }
            }
        }
        Ok(())
    }

    pub fn sign(&self, data: &[u8], key_id: Option<&str>) -> TrustResult<Vec<u8>> {
        self.sign_with_context(data, key_id, &SigningContext::default())
    }

    pub fn sign_with_context(&self, data: &[u8], key_id: Option<&str>, context: &SigningContext) -> TrustResult<Vec<u8>> {
        let entry = self.keys.resolve(key_id).ok_or_else(|| {
            TrustError::configuration(format!("no signing key named '{}'", display_name(key_id)))
        })?;

        match &entry.material {
            KeyMaterial::Secret(secret) => {
                let key = context.usable_session_secret().unwrap_or(secret.as_slice());
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| TrustError::crypto(format!("invalid HMAC key: {e}")))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            KeyMaterial::Certificate(_) => {
                let certificate = self.certificate_for(entry)?;
                let private_key = certificate.private_key().ok_or_else(|| {
                    TrustError::configuration(format!(
                        "certificate '{}' for signing key '{}' has no private key",
                        certificate.subject(),
                        display_name(entry.name())
                    ))
                })?;

                let signature = match entry.algorithm {
                    SigningAlgorithm::Rs256 => SigningKey::<Sha256>::new(private_key.clone()).try_sign(data),
                    SigningAlgorithm::Rs512 => SigningKey::<Sha512>::new(private_key.clone()).try_sign(data),
                    SigningAlgorithm::Hs256 => {
                        return Err(TrustError::configuration("HS256 key backed by a certificate"));
                    }
                }
                .map_err(|e| TrustError::crypto(format!("RSA signing failed: {e}")))?;

                Ok(signature.to_vec())
            }
        }
    }

    /// `Ok(false)` for a bad signature or an unknown key id; errors only when a
    /// configured key is unusable.
    pub fn verify(&self, data: &[u8], signature: &[u8], key_id: Option<&str>) -> TrustResult<bool> {
        self.verify_with_context(data, signature, key_id, &SigningContext::default())
    }

    pub fn verify_with_context(
        &self,
        data: &[u8],
        signature: &[u8],
        key_id: Option<&str>,
        context: &SigningContext,
    ) -> TrustResult<bool> {
        let Some(entry) = self.keys.resolve(key_id) else {
            tracing::warn!(key = display_name(key_id), "verification requested with unknown signing key");
            return Ok(false);
        };

        let valid = match &entry.material {
            KeyMaterial::Secret(secret) => {
                let key = context.usable_session_secret().unwrap_or(secret.as_slice());
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| TrustError::crypto(format!("invalid HMAC key: {e}")))?;
                mac.update(data);
                // Constant-time comparison.
                mac.verify_slice(signature).is_ok()
            }
            KeyMaterial::Certificate(_) => {
                let certificate = self.certificate_for(entry)?;
                let Ok(signature) = Signature::try_from(signature) else {
                    return Ok(false);
                };
                let public_key = certificate.public_key().clone();
                match entry.algorithm {
                    SigningAlgorithm::Rs256 => VerifyingKey::<Sha256>::new(public_key).verify(data, &signature).is_ok(),
                    SigningAlgorithm::Rs512 => VerifyingKey::<Sha512>::new(public_key).verify(data, &signature).is_ok(),
                    SigningAlgorithm::Hs256 => false,
                }
            }
        };

        if !valid {
            tracing::debug!(key = display_name(entry.name()), algorithm = %entry.algorithm, "signature rejected");
        }
        Ok(valid)
    }

    fn certificate_for(&self, entry: &SigningKeyEntry) -> TrustResult<Arc<Certificate>> {
        let KeyMaterial::Certificate(reference) = &entry.material else {
            return Err(TrustError::configuration("signing key has no certificate"));
        };
        entry
            .certificate
            .get_or_try_init(|| {
                let certificate = self.certificates.resolve(reference)?;
                tracing::info!(
                    key = display_name(entry.name()),
                    thumbprint = certificate.thumbprint(),
                    "resolved signing certificate"
                );
                Ok(certificate)
            })
            .cloned()
    }
}

impl core::fmt::Debug for SigningService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningService").field("keys", &self.keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::certificate::InMemoryCertificateStore;
    use crate::certificate::tests::{OTHER_KEY, TEST_KEY};
    use crate::config::CertificateFindType;

    fn subject_ref(subject: &str) -> CertificateReference {
        CertificateReference {
            store: "my".into(),
            find_type: CertificateFindType::SubjectName,
            find_value: subject.into(),
        }
    }

    fn service() -> SigningService {
        let store = InMemoryCertificateStore::new()
            .with_certificate("my", Certificate::from_private_key("CN=primary", TEST_KEY.clone()).unwrap())
            .with_certificate("my", Certificate::from_public_key("CN=partner", OTHER_KEY.to_public_key()).unwrap());

        let keys = SigningKeyRegistry::new(vec![
            SigningKeyEntry::hmac(None, b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            SigningKeyEntry::hmac(Some("session"), b"fedcba9876543210".to_vec()).unwrap(),
            SigningKeyEntry::certificate(Some("rs256"), SigningAlgorithm::Rs256, subject_ref("CN=primary")).unwrap(),
            SigningKeyEntry::certificate(Some("rs512"), SigningAlgorithm::Rs512, subject_ref("CN=primary")).unwrap(),
            SigningKeyEntry::certificate(Some("partner"), SigningAlgorithm::Rs256, subject_ref("CN=partner")).unwrap(),
            SigningKeyEntry::certificate(Some("missing"), SigningAlgorithm::Rs256, subject_ref("CN=nobody")).unwrap(),
        ]);

        SigningService::new(keys, Arc::new(store))
    }

    fn flip_bit(signature: &[u8]) -> Vec<u8> {
        let mut flipped = signature.to_vec();
        flipped[0] ^= 0x01;
        flipped
    }

    #[test]
    fn round_trip_for_every_signing_key() {
        let service = service();
        let data = b"the quick brown fox";

        for key in [None, Some("default"), Some("session"), Some("rs256"), Some("rs512")] {
            let signature = service.sign(data, key).unwrap();
            assert!(service.verify(data, &signature, key).unwrap(), "{key:?}");
            assert!(!service.verify(data, &flip_bit(&signature), key).unwrap(), "{key:?}");
            assert!(!service.verify(b"tampered", &signature, key).unwrap(), "{key:?}");
        }
    }

    #[test]
    fn digest_sizes_follow_algorithm() {
        let service = service();
        assert_eq!(service.sign(b"x", None).unwrap().len(), 32);
        // 1024-bit modulus either way; the digest differs.
        let rs256 = service.sign(b"x", Some("rs256")).unwrap();
        let rs512 = service.sign(b"x", Some("rs512")).unwrap();
        assert_eq!(rs256.len(), 128);
        assert_ne!(rs256, rs512);
        assert!(!service.verify(b"x", &rs256, Some("rs512")).unwrap());
    }

    #[test]
    fn wrong_key_id_does_not_verify() {
        let service = service();
        let signature = service.sign(b"payload", Some("session")).unwrap();
        assert!(!service.verify(b"payload", &signature, None).unwrap());
        assert!(!service.verify(b"payload", &signature, Some("nope")).unwrap());
    }

    #[test]
    fn signing_with_unknown_key_fails_loudly() {
        let err = service().sign(b"payload", Some("nope")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn certificate_without_private_key_cannot_sign() {
        let service = service();
        let err = service.sign(b"payload", Some("partner")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no private key"));

        // A partner signature still verifies against the public certificate.
        let partner_signature = SigningKey::<Sha256>::new(OTHER_KEY.clone()).sign(b"payload").to_vec();
        assert!(service.verify(b"payload", &partner_signature, Some("partner")).unwrap());
    }

    #[test]
    fn missing_certificate_is_a_configuration_error() {
        let service = service();
        assert!(service.sign(b"payload", Some("missing")).unwrap_err().is_configuration());
        assert!(service.verify(b"payload", b"sig", Some("missing")).unwrap_err().is_configuration());
        assert!(service.validate_keys().unwrap_err().is_configuration());
    }

    #[test]
    fn long_session_secret_overrides_configured_hmac_secret() {
        let service = service();
        let context = SigningContext::with_session_secret(b"negotiated-session-secret".to_vec());

        let with_context = service.sign_with_context(b"payload", None, &context).unwrap();
        let without = service.sign(b"payload", None).unwrap();
        assert_ne!(with_context, without);
        assert!(service.verify_with_context(b"payload", &with_context, None, &context).unwrap());
        assert!(!service.verify(b"payload", &with_context, None).unwrap());
    }

    #[test]
    fn short_session_secret_is_ignored() {
        let service = service();
        let context = SigningContext::with_session_secret(b"too-short".to_vec());
        assert_eq!(
            service.sign_with_context(b"payload", None, &context).unwrap(),
            service.sign(b"payload", None).unwrap()
        );
    }

    /// Store that counts lookups, to observe the per-key cache.
    struct CountingStore {
        inner: InMemoryCertificateStore,
        lookups: AtomicUsize,
    }

    impl CertificateStore for CountingStore {
        fn find(
            &self,
            store: &str,
            find_type: CertificateFindType,
            value: &str,
        ) -> TrustResult<Option<Arc<Certificate>>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find(store, find_type, value)
        }
    }

    #[test]
    fn certificates_are_resolved_once_per_key() {
        let store = Arc::new(CountingStore {
            inner: InMemoryCertificateStore::new()
                .with_certificate("my", Certificate::from_private_key("CN=primary", TEST_KEY.clone()).unwrap()),
            lookups: AtomicUsize::new(0),
        });
        let keys = SigningKeyRegistry::new(vec![
            SigningKeyEntry::certificate(None, SigningAlgorithm::Rs256, subject_ref("CN=primary")).unwrap(),
        ]);
        let service = SigningService::new(keys, store.clone());

        service.validate_keys().unwrap();
        for _ in 0..3 {
            let signature = service.sign(b"payload", None).unwrap();
            assert!(service.verify(b"payload", &signature, None).unwrap());
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hmac_key_cannot_be_backed_by_certificate() {
        let err = SigningKeyEntry::certificate(None, SigningAlgorithm::Hs256, subject_ref("CN=primary")).unwrap_err();
        assert!(err.is_configuration());
    }
}
