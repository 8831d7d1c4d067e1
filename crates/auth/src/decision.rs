use serde::Serialize;

use crate::policy::{GrantRule, PolicyIdentifier};
use crate::securable::SecurableRef;

/// Resolved rule for one protective policy of a securable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecisionDetail {
    pub policy: PolicyIdentifier,
    pub rule: GrantRule,
}

/// Per-policy access decision for a principal against a securable.
///
/// Details follow the order in which the catalog returned the securable's
/// policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDecision {
    pub securable: SecurableRef,
    pub details: Vec<PolicyDecisionDetail>,
}

impl PolicyDecision {
    /// Aggregate outcome: the most restrictive detail, or Grant when nothing
    /// protects the securable.
    pub fn outcome(&self) -> GrantRule {
        self.details
            .iter()
            .map(|d| d.rule)
            .min()
            .unwrap_or(GrantRule::Grant)
    }

    /// Policies whose resolved rule is not Grant.
    pub fn blocking_policies(&self) -> impl Iterator<Item = &PolicyDecisionDetail> {
        self.details.iter().filter(|d| d.rule != GrantRule::Grant)
    }
}
