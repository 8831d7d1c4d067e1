use serde::{Deserialize, Serialize};

use trustcore_core::SecurableId;

/// Reference to an object that can carry protective policies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurableRef {
    pub id: SecurableId,
    /// Free-form type label (e.g. "patient", "act"); informational only.
    pub kind: String,
}

impl SecurableRef {
    pub fn new(id: SecurableId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
        }
    }
}

impl core::fmt::Display for SecurableRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
