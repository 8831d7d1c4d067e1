//! Policy identifiers, grant rules and policy instances.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use trustcore_core::{TrustError, TrustResult};

use crate::handler::PolicyHandler;

const SEPARATOR: char = '.';

/// Hierarchical, dot-delimited policy identifier (e.g. `1.3.6.1.4.1.33349.3.1.5.9.2.2.3`).
///
/// Identifiers form a tree: `1.2.3` is a specialization of `1.2`, which is
/// itself a specialization of `1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyIdentifier(Cow<'static, str>);

impl PolicyIdentifier {
    /// Parse and validate an identifier.
    pub fn parse(value: impl Into<Cow<'static, str>>) -> TrustResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(TrustError::invalid_argument("policy identifier is empty"));
        }
        if value.trim() != value {
            return Err(TrustError::invalid_argument(format!(
                "policy identifier '{value}' has surrounding whitespace"
            )));
        }
        if value.split(SEPARATOR).any(str::is_empty) {
            return Err(TrustError::invalid_argument(format!(
                "policy identifier '{value}' has an empty segment"
            )));
        }
        Ok(Self(value))
    }

    /// Identifier from a compile-time constant. The caller vouches for validity.
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters; the engine's specificity tie-break.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// `true` iff `other` equals `self` or lies beneath it in the tree.
    pub fn covers(&self, other: &PolicyIdentifier) -> bool {
        covers(self.as_str(), other.as_str())
    }

    /// `true` iff `self` equals `other` or lies beneath it in the tree.
    pub fn is_covered_by(&self, other: &PolicyIdentifier) -> bool {
        other.covers(self)
    }
}

/// Coverage predicate on raw identifiers: `child` is covered by `parent` iff
/// `child == parent` or `child` starts with `parent` followed by a separator.
pub fn covers(parent: &str, child: &str) -> bool {
    match child.strip_prefix(parent) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

impl core::fmt::Display for PolicyIdentifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for PolicyIdentifier {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.to_string())
    }
}

impl TryFrom<String> for PolicyIdentifier {
    type Error = TrustError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PolicyIdentifier> for String {
    fn from(value: PolicyIdentifier) -> Self {
        value.0.into_owned()
    }
}

/// Outcome of evaluating a policy.
///
/// The discriminants are load-bearing: the minimum of a set of rules is the
/// most restrictive one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GrantRule {
    Deny = 0,
    /// Allowed only after step-up (break-the-glass) authentication.
    Elevate = 1,
    Grant = 2,
}

impl GrantRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantRule::Deny => "deny",
            GrantRule::Elevate => "elevate",
            GrantRule::Grant => "grant",
        }
    }

    pub fn is_more_restrictive_than(self, other: GrantRule) -> bool {
        self < other
    }
}

impl core::fmt::Display for GrantRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy attached to a principal or securable, with the rule granted there.
#[derive(Debug, Clone)]
pub struct PolicyInstance {
    pub id: PolicyIdentifier,
    pub name: String,
    pub rule: GrantRule,
    /// Inactive policies are not enforced.
    pub is_active: bool,
    /// Whether an Elevate rule may actually be satisfied by step-up.
    pub can_override: bool,
    pub handler: Option<Arc<dyn PolicyHandler>>,
}

impl PolicyInstance {
    /// Active, non-overridable instance without a custom handler.
    pub fn new(id: PolicyIdentifier, rule: GrantRule) -> Self {
        Self {
            name: id.to_string(),
            id,
            rule,
            is_active: true,
            can_override: false,
            handler: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn overridable(mut self, can_override: bool) -> Self {
        self.can_override = can_override;
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn PolicyHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// Serializable description of a policy instance (the catalog-loading format).
///
/// Handlers are referenced by name and resolved through a
/// [`HandlerRegistry`](crate::handler::HandlerRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInstanceConfig {
    pub id: PolicyIdentifier,
    #[serde(default)]
    pub name: Option<String>,
    pub rule: GrantRule,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub can_override: bool,
    #[serde(default)]
    pub handler: Option<String>,
}

fn default_true() -> bool {
    true
}
