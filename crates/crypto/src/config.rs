//! Security configuration: signing keys, password hashing, context secret.
//!
//! The on-disk format belongs to the surrounding configuration subsystem; this
//! module only defines the values the crypto primitives consume, plus loaders
//! for a JSON document and for environment variables.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use trustcore_core::{TrustError, TrustResult};

/// JSON `SecurityConfig` document.
pub const CONFIG_ENV: &str = "TRUSTCORE_SECURITY_CONFIG";
/// Overrides `context_secret`.
pub const CONTEXT_SECRET_ENV: &str = "TRUSTCORE_CONTEXT_SECRET";
/// Overrides `password_hashing` (`sha256`, `sha1`, `md5`, `plaintext`).
pub const HASHING_ENV: &str = "TRUSTCORE_PASSWORD_HASHING";

/// Name that marks the fallback signing key when used explicitly.
pub const DEFAULT_KEY_NAME: &str = "default";

/// Shortest HMAC secret accepted without a warning (128 bits).
pub const MIN_HMAC_SECRET_LEN: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// RSA PKCS#1 v1.5 with SHA-512.
    #[serde(rename = "RS512")]
    Rs512,
    /// HMAC-SHA256 with a shared secret.
    #[serde(rename = "HS256")]
    Hs256,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Rs512 => "RS512",
            SigningAlgorithm::Hs256 => "HS256",
        }
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self, SigningAlgorithm::Hs256)
    }
}

impl core::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SigningAlgorithm {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RS256" => Ok(Self::Rs256),
            "RS512" => Ok(Self::Rs512),
            "HS256" => Ok(Self::Hs256),
            other => Err(TrustError::configuration(format!("unsupported signing algorithm '{other}'"))),
        }
    }
}

/// Password digest strategy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashingAlgorithm {
    #[default]
    Sha256,
    Sha1,
    Md5,
    /// Identity function. Interoperability and tests only.
    Plaintext,
}

impl HashingAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashingAlgorithm::Sha256 => "sha256",
            HashingAlgorithm::Sha1 => "sha1",
            HashingAlgorithm::Md5 => "md5",
            HashingAlgorithm::Plaintext => "plaintext",
        }
    }
}

impl core::fmt::Display for HashingAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for HashingAlgorithm {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            "plaintext" => Ok(Self::Plaintext),
            other => Err(TrustError::configuration(format!("unsupported hashing algorithm '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateFindType {
    Thumbprint,
    SubjectName,
}

/// Where to find a certificate: a named store plus a search criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateReference {
    pub store: String,
    pub find_type: CertificateFindType,
    pub find_value: String,
}

impl core::fmt::Display for CertificateReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = match self.find_type {
            CertificateFindType::Thumbprint => "thumbprint",
            CertificateFindType::SubjectName => "subject",
        };
        write!(f, "{}:{}={}", self.store, kind, self.find_value)
    }
}

/// One configured signing key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeyConfig {
    /// `None` (or [`DEFAULT_KEY_NAME`]) marks the fallback key.
    #[serde(default)]
    pub key_name: Option<String>,
    pub algorithm: SigningAlgorithm,
    /// Shared secret for HS256 (UTF-8).
    #[serde(default)]
    pub secret: Option<String>,
    /// Certificate for RS256/RS512.
    #[serde(default)]
    pub certificate: Option<CertificateReference>,
}

impl SigningKeyConfig {
    pub fn is_default(&self) -> bool {
        self.key_name.as_deref().is_none_or(|n| n == DEFAULT_KEY_NAME)
    }

    fn display_name(&self) -> &str {
        self.key_name.as_deref().unwrap_or(DEFAULT_KEY_NAME)
    }
}

impl core::fmt::Debug for SigningKeyConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKeyConfig")
            .field("key_name", &self.key_name)
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// Non-fatal findings of [`SecurityConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No context secret: the symmetric context key uses the built-in fallback.
    FallbackContextSecret,
    /// Passwords would be stored as plaintext.
    PlaintextPasswordHashing,
    /// A legacy digest (MD5/SHA-1) is selected for passwords.
    WeakPasswordHashing(HashingAlgorithm),
    /// An HMAC secret shorter than 128 bits.
    ShortHmacSecret { key: String },
}

impl core::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigWarning::FallbackContextSecret => {
                f.write_str("no context secret configured; using the insecure built-in fallback")
            }
            ConfigWarning::PlaintextPasswordHashing => f.write_str("password hashing is set to plaintext"),
            ConfigWarning::WeakPasswordHashing(alg) => write!(f, "password hashing uses legacy digest {alg}"),
            ConfigWarning::ShortHmacSecret { key } => {
                write!(f, "HMAC secret for key '{key}' is shorter than {MIN_HMAC_SECRET_LEN} bytes")
            }
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub signing_keys: Vec<SigningKeyConfig>,
    pub password_hashing: HashingAlgorithm,
    /// Secret the process-default symmetric key is derived from.
    pub context_secret: Option<String>,
}

impl core::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("signing_keys", &self.signing_keys)
            .field("password_hashing", &self.password_hashing)
            .field("context_secret", &self.context_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SecurityConfig {
    pub fn from_json(json: &str) -> TrustResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TrustError::configuration(format!("invalid security configuration: {e}")))
    }

    /// Load from the process environment.
    pub fn from_env() -> TrustResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (the environment, a secrets provider, a test map).
    pub fn from_lookup<F>(lookup: F) -> TrustResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(json) => Self::from_json(&json)?,
            None => {
                tracing::warn!("{CONFIG_ENV} not set; starting without signing keys");
                Self::default()
            }
        };

        if let Some(secret) = lookup(CONTEXT_SECRET_ENV) {
            config.context_secret = Some(secret);
        }
        if let Some(algorithm) = lookup(HASHING_ENV) {
            config.password_hashing = algorithm.parse()?;
        }

        Ok(config)
    }

    /// Startup validation pass.
    ///
    /// Returns the first fatal problem as a `Configuration` error; otherwise the
    /// list of warnings (each also logged).
    pub fn validate(&self) -> TrustResult<Vec<ConfigWarning>> {
        let mut warnings = Vec::new();
        let mut names = HashSet::new();

        for key in &self.signing_keys {
            let name = key.display_name();
            if !names.insert(name) {
                return Err(TrustError::configuration(if key.is_default() {
                    "more than one default signing key".to_string()
                } else {
                    format!("duplicate signing key name '{name}'")
                }));
            }

            match (key.algorithm.is_symmetric(), &key.secret, &key.certificate) {
                (true, None, _) => {
                    return Err(TrustError::configuration(format!(
                        "signing key '{name}' uses {} but has no secret",
                        key.algorithm
                    )));
                }
                (true, Some(secret), _) if secret.is_empty() => {
                    return Err(TrustError::configuration(format!("signing key '{name}' has an empty secret")));
                }
                (true, Some(secret), _) if secret.len() < MIN_HMAC_SECRET_LEN => {
                    warnings.push(ConfigWarning::ShortHmacSecret { key: name.to_string() });
                }
                (false, _, None) => {
                    return Err(TrustError::configuration(format!(
                        "signing key '{name}' uses {} but has no certificate reference",
                        key.algorithm
                    )));
                }
                _ => {}
            }
        }

        match self.password_hashing {
            HashingAlgorithm::Plaintext => warnings.push(ConfigWarning::PlaintextPasswordHashing),
            alg @ (HashingAlgorithm::Md5 | HashingAlgorithm::Sha1) => {
                warnings.push(ConfigWarning::WeakPasswordHashing(alg))
            }
            HashingAlgorithm::Sha256 => {}
        }

        if self.context_secret.as_deref().is_none_or(str::is_empty) {
            warnings.push(ConfigWarning::FallbackContextSecret);
        }

        for warning in &warnings {
            tracing::warn!(%warning, "security configuration warning");
        }

        Ok(warnings)
    }
}
