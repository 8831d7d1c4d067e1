//! `trustcore-auth`: policy decision point.
//!
//! Resolves whether a principal may exercise a policy-protected capability,
//! either by policy identifier or against a securable's protective policies.
//! This crate is decoupled from transport and storage: policy data comes in
//! through [`PolicyCatalog`].

pub mod catalog;
pub mod claims;
pub mod decision;
pub mod engine;
pub mod explain;
pub mod handler;
pub mod policy;
pub mod principal;
pub mod securable;
pub mod well_known;

pub use catalog::{InMemoryPolicyCatalog, PolicyCatalog};
pub use claims::{ClaimType, Claims};
pub use decision::{PolicyDecision, PolicyDecisionDetail};
pub use engine::{EngineOptions, PolicyDecisionEngine, prefer, select_winner};
pub use explain::{Candidate, OutcomeExplanation, OutcomeReason};
pub use handler::{FixedOutcomeHandler, HandlerRegistry, PolicyContext, PolicyHandler, RequireClaimHandler};
pub use policy::{GrantRule, PolicyIdentifier, PolicyInstance, PolicyInstanceConfig};
pub use principal::{Principal, PrincipalKind};
pub use securable::SecurableRef;
