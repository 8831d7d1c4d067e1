//! Policy outcome explanation (audit trail).
//!
//! [`PolicyDecisionEngine::explain_outcome`](crate::engine::PolicyDecisionEngine::explain_outcome)
//! produces these; the plain outcome query is derived from the same value, so
//! what gets audited is exactly what was enforced.

use serde::Serialize;

use trustcore_core::PrincipalId;

use crate::policy::{GrantRule, PolicyIdentifier, PolicyInstance};

/// Why the engine arrived at an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    /// A granted-policy claim covered the request; the catalog was not consulted.
    ClaimGrant,
    /// No policy held by the principal covers the request.
    NoMatchingPolicy,
    /// The winning policy is inactive and therefore not enforced.
    InactivePolicy,
    /// The winning policy says Elevate but does not allow override.
    ElevationNotPermitted,
    /// The winning policy carries a handler which decided.
    DelegatedToHandler,
    /// The winning policy's own rule applies.
    MatchedPolicy,
}

impl OutcomeReason {
    pub fn describe(&self) -> &'static str {
        match self {
            OutcomeReason::ClaimGrant => "granted by a policy claim on the principal",
            OutcomeReason::NoMatchingPolicy => "no policy held by the principal covers the request",
            OutcomeReason::InactivePolicy => "winning policy is inactive and not enforced",
            OutcomeReason::ElevationNotPermitted => "winning policy requires elevation but cannot be overridden",
            OutcomeReason::DelegatedToHandler => "winning policy delegated to its custom handler",
            OutcomeReason::MatchedPolicy => "rule of the winning policy",
        }
    }
}

/// One policy that covered the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub policy: PolicyIdentifier,
    pub name: String,
    pub rule: GrantRule,
    pub is_active: bool,
    pub can_override: bool,
    pub has_handler: bool,
}

impl From<&PolicyInstance> for Candidate {
    fn from(instance: &PolicyInstance) -> Self {
        Self {
            policy: instance.id.clone(),
            name: instance.name.clone(),
            rule: instance.rule,
            is_active: instance.is_active,
            can_override: instance.can_override,
            has_handler: instance.handler.is_some(),
        }
    }
}

/// Detailed explanation of a policy outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeExplanation {
    pub principal_id: PrincipalId,
    pub requested: PolicyIdentifier,
    pub outcome: GrantRule,
    pub reason: OutcomeReason,
    /// The claim value that granted access on the fast path.
    pub granting_claim: Option<String>,
    /// Covering policies in discovery order.
    pub candidates: Vec<Candidate>,
    pub winner: Option<PolicyIdentifier>,
}

impl OutcomeExplanation {
    pub fn is_granted(&self) -> bool {
        self.outcome == GrantRule::Grant
    }

    /// Human-readable one-line summary for logs and admin tooling.
    pub fn summary(&self) -> String {
        match (&self.winner, &self.granting_claim) {
            (Some(winner), _) => format!(
                "{} on {}: {} (policy {})",
                self.outcome,
                self.requested,
                self.reason.describe(),
                winner
            ),
            (None, Some(claim)) => format!(
                "{} on {}: {} ({})",
                self.outcome,
                self.requested,
                self.reason.describe(),
                claim
            ),
            (None, None) => format!("{} on {}: {}", self.outcome, self.requested, self.reason.describe()),
        }
    }
}
