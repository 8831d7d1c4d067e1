//! Policy decision engine.
//!
//! - No IO beyond the catalog query
//! - No panics
//! - No shared mutable state: safe to call from any number of threads

use serde::{Deserialize, Serialize};

use trustcore_core::TrustResult;

use crate::catalog::PolicyCatalog;
use crate::decision::{PolicyDecision, PolicyDecisionDetail};
use crate::explain::{Candidate, OutcomeExplanation, OutcomeReason};
use crate::handler::PolicyContext;
use crate::policy::{GrantRule, PolicyIdentifier, PolicyInstance};
use crate::principal::Principal;
use crate::securable::SecurableRef;
use crate::well_known;

/// Tunables of the decision engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Outcome when no policy covers a request. Fail-closed unless changed.
    pub default_outcome: GrantRule,
    /// Policy whose explicit Grant interacts with the securable elevation gate.
    pub elevation_policy: PolicyIdentifier,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_outcome: GrantRule::Deny,
            elevation_policy: well_known::ELEVATE_CLINICAL_DATA,
        }
    }
}

/// `true` if `candidate` should replace `incumbent` as the winning policy:
/// strictly more restrictive, or equally restrictive and more specific.
pub fn prefer(candidate: &PolicyInstance, incumbent: &PolicyInstance) -> bool {
    candidate.rule < incumbent.rule || (candidate.rule == incumbent.rule && candidate.id.len() > incumbent.id.len())
}

/// Pairwise reduction over candidates. The first candidate seeds the winner.
pub fn select_winner<'a, I>(candidates: I) -> Option<&'a PolicyInstance>
where
    I: IntoIterator<Item = &'a PolicyInstance>,
{
    candidates
        .into_iter()
        .reduce(|winner, candidate| if prefer(candidate, winner) { candidate } else { winner })
}

#[derive(Debug, Clone)]
pub struct PolicyDecisionEngine<C> {
    catalog: C,
    options: EngineOptions,
}

impl<C: PolicyCatalog> PolicyDecisionEngine<C> {
    pub fn new(catalog: C) -> Self {
        Self::with_options(catalog, EngineOptions::default())
    }

    pub fn with_options(catalog: C, options: EngineOptions) -> Self {
        Self { catalog, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Outcome of `principal` asking for `policy_id`.
    ///
    /// Fails only for a malformed identifier or an unavailable catalog; "no
    /// matching policy" is the default outcome, not an error.
    pub fn policy_outcome(&self, principal: &Principal, policy_id: &str) -> TrustResult<GrantRule> {
        Ok(self.explain_outcome(principal, policy_id)?.outcome)
    }

    pub fn explain_outcome(&self, principal: &Principal, policy_id: &str) -> TrustResult<OutcomeExplanation> {
        let requested: PolicyIdentifier = policy_id.parse()?;

        if let Some(claim) = principal.claims.granted_policy_covering(&requested) {
            tracing::debug!(principal = %principal.id, policy = %requested, claim, "policy granted by claim");
            return Ok(OutcomeExplanation {
                principal_id: principal.id,
                requested,
                outcome: GrantRule::Grant,
                reason: OutcomeReason::ClaimGrant,
                granting_claim: Some(claim.to_string()),
                candidates: Vec::new(),
                winner: None,
            });
        }

        let candidates: Vec<PolicyInstance> = self
            .catalog
            .active_policies_for_principal(principal)?
            .into_iter()
            .filter(|p| p.id.covers(&requested))
            .collect();

        let (outcome, reason, winner) = match select_winner(&candidates) {
            None => (self.options.default_outcome, OutcomeReason::NoMatchingPolicy, None),
            Some(winner) => {
                let (outcome, reason) = self.resolve_winner(principal, &requested, winner);
                (outcome, reason, Some(winner.id.clone()))
            }
        };

        tracing::debug!(
            principal = %principal.id,
            policy = %requested,
            outcome = %outcome,
            reason = ?reason,
            candidates = candidates.len(),
            "resolved policy outcome"
        );

        Ok(OutcomeExplanation {
            principal_id: principal.id,
            requested,
            outcome,
            reason,
            granting_claim: None,
            candidates: candidates.iter().map(Candidate::from).collect(),
            winner,
        })
    }

    fn resolve_winner(
        &self,
        principal: &Principal,
        requested: &PolicyIdentifier,
        winner: &PolicyInstance,
    ) -> (GrantRule, OutcomeReason) {
        if let Some(handler) = &winner.handler {
            let context = PolicyContext {
                requested,
                policy: winner,
            };
            return (handler.decide(principal, &context), OutcomeReason::DelegatedToHandler);
        }

        // An unenforced policy cannot gate anything, including elevation.
        if !winner.is_active {
            return (GrantRule::Grant, OutcomeReason::InactivePolicy);
        }

        if winner.rule == GrantRule::Elevate && !winner.can_override {
            return (GrantRule::Deny, OutcomeReason::ElevationNotPermitted);
        }

        (winner.rule, OutcomeReason::MatchedPolicy)
    }

    /// Resolve every active protective policy of `securable` for `principal`.
    pub fn policy_decision(&self, principal: &Principal, securable: &SecurableRef) -> TrustResult<PolicyDecision> {
        let securable_policies = self.catalog.active_policies_for_securable(securable)?;
        let principal_policies = self.catalog.active_policies_for_principal(principal)?;

        // NOTE: holding an explicit Grant on the elevation policy *blocks*
        // elevation here. That reads inverted and is kept as-is until the
        // intended rule is confirmed.
        let holds_elevation_grant = principal_policies
            .iter()
            .any(|p| p.id == self.options.elevation_policy && p.rule == GrantRule::Grant);

        let details = securable_policies
            .iter()
            .filter(|p| p.is_active)
            .map(|protective| {
                let rule = principal_policies
                    .iter()
                    .filter(|held| held.id.covers(&protective.id))
                    .map(|held| held.rule)
                    .min()
                    .unwrap_or(self.options.default_outcome);

                let rule = if rule == GrantRule::Elevate && (!protective.can_override || holds_elevation_grant) {
                    GrantRule::Deny
                } else {
                    rule
                };

                PolicyDecisionDetail {
                    policy: protective.id.clone(),
                    rule,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            principal = %principal.id,
            securable = %securable,
            policies = details.len(),
            "resolved policy decision"
        );

        Ok(PolicyDecision {
            securable: securable.clone(),
            details,
        })
    }
}
