//! Non-hashing "strategies" for interoperability testing.
//!
//! Nothing here is selected by default. Selecting it through configuration
//! raises a validation warning.

use trustcore_core::TrustResult;

use super::{PasswordHasher, ensure_password};
use crate::config::HashingAlgorithm;

/// Returns the password unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextPasswordHasher;

impl PasswordHasher for PlaintextPasswordHasher {
    fn algorithm(&self) -> HashingAlgorithm {
        HashingAlgorithm::Plaintext
    }

    fn compute_hash(&self, password: &str) -> TrustResult<String> {
        ensure_password(password)?;
        Ok(password.to_string())
    }
}
