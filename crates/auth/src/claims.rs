//! Typed claims carried by a principal.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::policy::{covers, PolicyIdentifier};

/// Claim types the trust core understands.
///
/// Serialized as a plain string so it can key a JSON object: the snake_case
/// name for known types, the type URI itself for [`ClaimType::Other`]. An
/// `Other` whose URI equals a known name reads back as that known type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ClaimType {
    /// A policy identifier granted directly to the principal (decision fast path).
    GrantedPolicy,
    Role,
    Name,
    Email,
    Telephone,
    DeviceId,
    ApplicationId,
    /// Anything else, keyed by its issuer-defined type URI.
    Other(String),
}

impl ClaimType {
    pub fn as_str(&self) -> &str {
        match self {
            ClaimType::GrantedPolicy => "granted_policy",
            ClaimType::Role => "role",
            ClaimType::Name => "name",
            ClaimType::Email => "email",
            ClaimType::Telephone => "telephone",
            ClaimType::DeviceId => "device_id",
            ClaimType::ApplicationId => "application_id",
            ClaimType::Other(uri) => uri.as_str(),
        }
    }
}

impl core::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ClaimType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "granted_policy" => ClaimType::GrantedPolicy,
            "role" => ClaimType::Role,
            "name" => ClaimType::Name,
            "email" => ClaimType::Email,
            "telephone" => ClaimType::Telephone,
            "device_id" => ClaimType::DeviceId,
            "application_id" => ClaimType::ApplicationId,
            _ => ClaimType::Other(value),
        }
    }
}

impl From<ClaimType> for String {
    fn from(value: ClaimType) -> Self {
        match value {
            ClaimType::Other(uri) => uri,
            known => known.as_str().to_string(),
        }
    }
}

/// Unordered bag of claims: claim type to a set of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<ClaimType, BTreeSet<String>>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, claim_type: ClaimType, value: impl Into<String>) -> Self {
        self.insert(claim_type, value);
        self
    }

    pub fn insert(&mut self, claim_type: ClaimType, value: impl Into<String>) {
        self.0.entry(claim_type).or_default().insert(value.into());
    }

    pub fn values(&self, claim_type: &ClaimType) -> impl Iterator<Item = &str> {
        self.0
            .get(claim_type)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// First value of a claim type, in lexical order.
    pub fn first(&self, claim_type: &ClaimType) -> Option<&str> {
        self.values(claim_type).next()
    }

    pub fn contains(&self, claim_type: &ClaimType, value: &str) -> bool {
        self.0
            .get(claim_type)
            .is_some_and(|set| set.contains(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    /// The granted-policy claim covering `requested`, if any.
    pub fn granted_policy_covering(&self, requested: &PolicyIdentifier) -> Option<&str> {
        self.values(&ClaimType::GrantedPolicy)
            .find(|granted| covers(granted, requested.as_str()))
    }
}
