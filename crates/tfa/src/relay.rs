use std::collections::HashSet;
use std::sync::Arc;

use trustcore_core::{MechanismId, TrustError, TrustResult};

use crate::mechanism::{TfaIdentity, TfaMechanism, TfaMechanismInfo};

/// Registry of step-up mechanisms, fixed at construction.
#[derive(Clone, Default)]
pub struct TfaRelay {
    mechanisms: Vec<Arc<dyn TfaMechanism>>,
}

impl TfaRelay {
    /// Registration order is kept for listing. Duplicate ids are rejected.
    pub fn new(mechanisms: Vec<Arc<dyn TfaMechanism>>) -> TrustResult<Self> {
        let mut seen = HashSet::with_capacity(mechanisms.len());
        for mechanism in &mechanisms {
            if !seen.insert(mechanism.id()) {
                return Err(TrustError::configuration(format!(
                    "tfa mechanism {} ({}) registered twice",
                    mechanism.id(),
                    mechanism.name()
                )));
            }
            tracing::info!(mechanism_id = %mechanism.id(), name = mechanism.name(), "tfa mechanism registered");
        }
        Ok(Self { mechanisms })
    }

    pub fn mechanisms(&self) -> Vec<TfaMechanismInfo> {
        self.mechanisms.iter().map(|m| TfaMechanismInfo::of(m.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.mechanisms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mechanisms.is_empty()
    }

    fn find(&self, id: MechanismId) -> TrustResult<&Arc<dyn TfaMechanism>> {
        self.mechanisms
            .iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| TrustError::not_found(format!("tfa mechanism {id}")))
    }

    pub fn send_secret(&self, mechanism_id: MechanismId, identity: &TfaIdentity) -> TrustResult<String> {
        self.find(mechanism_id)?.send(identity)
    }

    pub fn validate_secret(&self, mechanism_id: MechanismId, identity: &TfaIdentity, secret: &str) -> TrustResult<bool> {
        self.find(mechanism_id)?.validate(identity, secret)
    }
}

impl core::fmt::Debug for TfaRelay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.mechanisms()).finish()
    }
}
