//! Policy information source consumed by the decision engine.

use std::collections::HashMap;
use std::sync::Arc;

use trustcore_core::{PrincipalId, SecurableId, TrustResult};

use crate::policy::PolicyInstance;
use crate::principal::Principal;
use crate::securable::SecurableRef;

/// Supplies the policy instances currently attached to principals and securables.
///
/// The catalog is the single source of truth for policy data; the engine only
/// reads from it. Implementations must be safe to query concurrently.
pub trait PolicyCatalog: Send + Sync {
    /// Policies in force for the principal (direct, role, device, ...).
    fn active_policies_for_principal(&self, principal: &Principal) -> TrustResult<Vec<PolicyInstance>>;

    /// Protective policies attached to a securable, in a stable order.
    fn active_policies_for_securable(&self, securable: &SecurableRef) -> TrustResult<Vec<PolicyInstance>>;
}

impl<S> PolicyCatalog for Arc<S>
where
    S: PolicyCatalog + ?Sized,
{
    fn active_policies_for_principal(&self, principal: &Principal) -> TrustResult<Vec<PolicyInstance>> {
        (**self).active_policies_for_principal(principal)
    }

    fn active_policies_for_securable(&self, securable: &SecurableRef) -> TrustResult<Vec<PolicyInstance>> {
        (**self).active_policies_for_securable(securable)
    }
}

/// Immutable in-memory catalog for tests, embedding and development.
///
/// Built up front with the `with_*` methods and read-only afterwards.
/// A principal's policies are its direct grants followed by the grants of each
/// role it claims (roles in lexical order).
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyCatalog {
    principals: HashMap<PrincipalId, Vec<PolicyInstance>>,
    roles: HashMap<String, Vec<PolicyInstance>>,
    securables: HashMap<SecurableId, Vec<PolicyInstance>>,
}

impl InMemoryPolicyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal_policy(mut self, principal: PrincipalId, policy: PolicyInstance) -> Self {
        self.principals.entry(principal).or_default().push(policy);
        self
    }

    pub fn with_role_policy(mut self, role: impl Into<String>, policy: PolicyInstance) -> Self {
        self.roles.entry(role.into()).or_default().push(policy);
        self
    }

    pub fn with_securable_policy(mut self, securable: SecurableId, policy: PolicyInstance) -> Self {
        self.securables.entry(securable).or_default().push(policy);
        self
    }
}

impl PolicyCatalog for InMemoryPolicyCatalog {
    fn active_policies_for_principal(&self, principal: &Principal) -> TrustResult<Vec<PolicyInstance>> {
        let direct = self.principals.get(&principal.id).into_iter().flatten();
        let via_roles = principal
            .roles()
            .filter_map(|role| self.roles.get(role))
            .flatten();

        Ok(direct.chain(via_roles).cloned().collect())
    }

    fn active_policies_for_securable(&self, securable: &SecurableRef) -> TrustResult<Vec<PolicyInstance>> {
        Ok(self
            .securables
            .get(&securable.id)
            .cloned()
            .unwrap_or_default())
    }
}
