use serde::{Deserialize, Serialize};

use trustcore_core::{MechanismId, PrincipalId, TrustResult};

/// Who is being challenged, and where the secret may be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfaIdentity {
    pub principal_id: PrincipalId,
    pub name: String,
    /// E-mail address, phone number, ... as understood by the mechanism.
    #[serde(default)]
    pub contact: Option<String>,
}

impl TfaIdentity {
    pub fn new(principal_id: PrincipalId, name: impl Into<String>) -> Self {
        Self {
            principal_id,
            name: name.into(),
            contact: None,
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }
}

/// A step-up delivery mechanism (e-mail, SMS, ...).
pub trait TfaMechanism: Send + Sync {
    fn id(&self) -> MechanismId;

    fn name(&self) -> &str;

    /// Prompt shown to the user while they wait for the secret.
    fn challenge(&self) -> &str;

    /// Issue and deliver a secret; returns a user-facing receipt.
    fn send(&self, identity: &TfaIdentity) -> TrustResult<String>;

    fn validate(&self, identity: &TfaIdentity, secret: &str) -> TrustResult<bool>;
}

/// Public description of a registered mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfaMechanismInfo {
    pub id: MechanismId,
    pub name: String,
    pub challenge: String,
}

impl TfaMechanismInfo {
    pub fn of(mechanism: &dyn TfaMechanism) -> Self {
        Self {
            id: mechanism.id(),
            name: mechanism.name().to_string(),
            challenge: mechanism.challenge().to_string(),
        }
    }
}
