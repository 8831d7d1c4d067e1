//! Password hashing strategies.
//!
//! Every strategy shares one contract: non-empty UTF-8 in, lowercase hex
//! digest out (no separators). The strategy is picked from configuration via
//! [`password_hasher`]; nothing else depends on which one is active.

pub mod interop;

use std::sync::Arc;

use sha2::Digest;

use trustcore_core::{TrustError, TrustResult};

use crate::config::HashingAlgorithm;

pub trait PasswordHasher: Send + Sync + core::fmt::Debug {
    fn algorithm(&self) -> HashingAlgorithm;

    fn compute_hash(&self, password: &str) -> TrustResult<String>;
}

pub(crate) fn ensure_password(password: &str) -> TrustResult<()> {
    if password.is_empty() {
        return Err(TrustError::invalid_argument("password is empty"));
    }
    Ok(())
}

macro_rules! digest_hasher {
    ($(#[$meta:meta])* $name:ident, $digest:ty, $algorithm:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl PasswordHasher for $name {
            fn algorithm(&self) -> HashingAlgorithm {
                $algorithm
            }

            fn compute_hash(&self, password: &str) -> TrustResult<String> {
                ensure_password(password)?;
                Ok(hex::encode(<$digest>::digest(password.as_bytes())))
            }
        }
    };
}

digest_hasher!(
    /// SHA-256 (the default).
    Sha256PasswordHasher,
    sha2::Sha256,
    HashingAlgorithm::Sha256
);
digest_hasher!(
    /// SHA-1, for stores populated by legacy systems.
    Sha1PasswordHasher,
    sha1::Sha1,
    HashingAlgorithm::Sha1
);
digest_hasher!(
    /// MD5, for stores populated by legacy systems.
    Md5PasswordHasher,
    md5::Md5,
    HashingAlgorithm::Md5
);

/// The configured strategy.
pub fn password_hasher(algorithm: HashingAlgorithm) -> Arc<dyn PasswordHasher> {
    match algorithm {
        HashingAlgorithm::Sha256 => Arc::new(Sha256PasswordHasher),
        HashingAlgorithm::Sha1 => Arc::new(Sha1PasswordHasher),
        HashingAlgorithm::Md5 => Arc::new(Md5PasswordHasher),
        HashingAlgorithm::Plaintext => {
            tracing::warn!("plaintext password hashing selected; passwords will not be hashed");
            Arc::new(interop::PlaintextPasswordHasher)
        }
    }
}
