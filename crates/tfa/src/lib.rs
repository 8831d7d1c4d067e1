//! `trustcore-tfa`: two-factor (step-up) secrets and their delivery.
//!
//! Mechanisms are registered explicitly with a [`TfaRelay`] at startup; the
//! relay then dispatches send/validate calls by [`MechanismId`].
//!
//! [`MechanismId`]: trustcore_core::MechanismId

pub mod delivery;
pub mod mechanism;
pub mod relay;
pub mod secret;

pub use delivery::{DeliveredSecretMechanism, InMemorySecretStore, PendingSecret, SecretDelivery, SecretStore};
pub use mechanism::{TfaIdentity, TfaMechanism, TfaMechanismInfo};
pub use relay::TfaRelay;
pub use secret::{ClockSecretGenerator, RandomSecretGenerator, TfaSecretGenerator};
