//! Custom policy handlers.
//!
//! A policy instance may carry a handler that takes over the outcome once the
//! instance wins selection. Handlers are plain capability objects chosen when
//! the catalog is loaded; the engine never inspects their concrete type.

use std::collections::HashMap;
use std::sync::Arc;

use trustcore_core::{TrustError, TrustResult};

use crate::claims::ClaimType;
use crate::policy::{GrantRule, PolicyIdentifier, PolicyInstance, PolicyInstanceConfig};
use crate::principal::Principal;

/// What a handler gets to see about the decision it is making.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// The identifier the caller asked about.
    pub requested: &'a PolicyIdentifier,
    /// The winning instance that carries the handler.
    pub policy: &'a PolicyInstance,
}

pub trait PolicyHandler: Send + Sync + core::fmt::Debug {
    fn decide(&self, principal: &Principal, context: &PolicyContext<'_>) -> GrantRule;
}

/// Always answers with the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOutcomeHandler(pub GrantRule);

impl PolicyHandler for FixedOutcomeHandler {
    fn decide(&self, _principal: &Principal, _context: &PolicyContext<'_>) -> GrantRule {
        self.0
    }
}

/// Grants the instance's rule only when the principal carries a given claim;
/// denies otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireClaimHandler {
    pub claim_type: ClaimType,
    pub value: String,
}

impl RequireClaimHandler {
    pub fn new(claim_type: ClaimType, value: impl Into<String>) -> Self {
        Self {
            claim_type,
            value: value.into(),
        }
    }
}

impl PolicyHandler for RequireClaimHandler {
    fn decide(&self, principal: &Principal, context: &PolicyContext<'_>) -> GrantRule {
        if principal.claims.contains(&self.claim_type, &self.value) {
            context.policy.rule
        } else {
            GrantRule::Deny
        }
    }
}

/// Name-keyed set of handlers used to materialize catalog configuration.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn PolicyHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, handler: Arc<dyn PolicyHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PolicyHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Turn a configured instance into a runtime one, resolving its handler.
    pub fn instantiate(&self, config: &PolicyInstanceConfig) -> TrustResult<PolicyInstance> {
        let handler = match &config.handler {
            Some(name) => Some(self.get(name).ok_or_else(|| {
                TrustError::configuration(format!(
                    "policy {} references unknown handler '{name}'",
                    config.id
                ))
            })?),
            None => None,
        };

        Ok(PolicyInstance {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.to_string()),
            rule: config.rule,
            is_active: config.is_active,
            can_override: config.can_override,
            handler,
        })
    }
}
