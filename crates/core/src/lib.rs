//! `trustcore-core`: shared building blocks of the trust & access-control core.
//!
//! Pure types only: the error taxonomy and strongly-typed identifiers.

pub mod error;
pub mod id;

pub use error::{TrustError, TrustResult};
pub use id::{MechanismId, PrincipalId, SecurableId};
