//! Strongly-typed identifiers used across the trust core.
//!
//! Each id wraps a UUID, serializes as its hyphenated string and parses back
//! with [`str::parse`]; a malformed string is an `InvalidArgument` naming the
//! kind of id that was expected.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TrustError;

macro_rules! trust_ids {
    ($( $(#[$doc:meta])* $name:ident => $label:literal; )+) => {$(
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered (v7) id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn into_uuid(self) -> Uuid {
                self.0
            }

            /// Human label used in error messages ("principal id", ...).
            pub const fn label() -> &'static str {
                $label
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = TrustError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_uuid(s, $label).map(Self)
            }
        }
    )+};
}

fn parse_uuid(s: &str, label: &str) -> Result<Uuid, TrustError> {
    Uuid::parse_str(s.trim()).map_err(|e| TrustError::invalid_argument(format!("malformed {label} '{s}': {e}")))
}

trust_ids! {
    /// Identifier of an authenticated principal (user, application, device).
    PrincipalId => "principal id";
    /// Identifier of a securable object (anything policies can be attached to).
    SecurableId => "securable id";
    /// Opaque handle of a registered two-factor mechanism.
    MechanismId => "tfa mechanism id";
}
