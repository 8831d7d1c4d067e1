use serde::{Deserialize, Serialize};

use trustcore_core::PrincipalId;

use crate::claims::{ClaimType, Claims};

/// What kind of actor a principal is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    #[default]
    User,
    Application,
    Device,
}

/// An authenticated actor whose access is being evaluated.
///
/// Construction is decoupled from token formats: the transport layer derives
/// the claim set after it has verified whatever credential it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub kind: PrincipalKind,
    pub name: String,
    pub claims: Claims,
}

impl Principal {
    pub fn new(id: PrincipalId, kind: PrincipalKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            claims: Claims::new(),
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(PrincipalId::new(), PrincipalKind::User, name)
    }

    pub fn with_claim(mut self, claim_type: ClaimType, value: impl Into<String>) -> Self {
        self.claims.insert(claim_type, value);
        self
    }

    pub fn with_role(self, role: impl Into<String>) -> Self {
        self.with_claim(ClaimType::Role, role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.claims.values(&ClaimType::Role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_with_issuer_claim_round_trips_through_json() {
        let principal = Principal::user("alice")
            .with_role("clinician")
            .with_claim(ClaimType::Other("urn:x".into()), "v");

        let json = serde_json::to_string(&principal).unwrap();
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, principal);
        assert_eq!(back.claims.first(&ClaimType::Other("urn:x".into())), Some("v"));
        assert_eq!(back.roles().collect::<Vec<_>>(), ["clinician"]);
    }
}
