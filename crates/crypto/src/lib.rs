//! `trustcore-crypto`: cryptographic primitives of the trust core.
//!
//! Signing/verification with configured keys, password hashing strategies and
//! AES symmetric encryption. All operations are synchronous, CPU-bound and
//! safe to call from any thread.

pub mod certificate;
pub mod config;
pub mod hashing;
pub mod signing;
pub mod symmetric;

pub use certificate::{Certificate, CertificateStore, InMemoryCertificateStore};
pub use config::{
    CertificateFindType, CertificateReference, ConfigWarning, HashingAlgorithm, SecurityConfig, SigningAlgorithm,
    SigningKeyConfig,
};
pub use hashing::{PasswordHasher, password_hasher};
pub use signing::{SigningContext, SigningKeyEntry, SigningKeyRegistry, SigningService};
pub use symmetric::{AesSymmetricProvider, HkdfKeyStretch, KeyStretch, SymmetricCryptoProvider, TilingKeyStretch};
