//! A mechanism assembled from a generator, a delivery channel and a store of
//! pending secrets.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;

use trustcore_core::{MechanismId, PrincipalId, TrustError, TrustResult};

use crate::mechanism::{TfaIdentity, TfaMechanism};
use crate::secret::{Clock, TfaSecretGenerator, system_clock};

/// How long an issued secret stays valid unless configured otherwise.
pub const DEFAULT_SECRET_TTL_MINUTES: i64 = 5;

/// Wrong guesses tolerated before a pending secret is discarded.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Outbound channel (mail relay, SMS gateway, ...).
pub trait SecretDelivery: Send + Sync {
    fn deliver(&self, identity: &TfaIdentity, contact: &str, secret: &str) -> TrustResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSecret {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    /// Wrong guesses made against this secret so far.
    pub failed_attempts: u32,
}

impl PendingSecret {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Secrets issued but not yet redeemed, at most one per principal.
pub trait SecretStore: Send + Sync {
    /// Replaces any secret already pending for the principal.
    fn put(&self, principal_id: PrincipalId, pending: PendingSecret) -> TrustResult<()>;
    fn get(&self, principal_id: PrincipalId) -> TrustResult<Option<PendingSecret>>;
    fn remove(&self, principal_id: PrincipalId) -> TrustResult<()>;
    /// Drop every entry expired at `now`; returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> TrustResult<usize>;
}

impl<S> SecretStore for Arc<S>
where
    S: SecretStore + ?Sized,
{
    fn put(&self, principal_id: PrincipalId, pending: PendingSecret) -> TrustResult<()> {
        (**self).put(principal_id, pending)
    }

    fn get(&self, principal_id: PrincipalId) -> TrustResult<Option<PendingSecret>> {
        (**self).get(principal_id)
    }

    fn remove(&self, principal_id: PrincipalId) -> TrustResult<()> {
        (**self).remove(principal_id)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> TrustResult<usize> {
        (**self).purge_expired(now)
    }
}

/// In-memory pending-secret store for tests/dev and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    inner: RwLock<HashMap<PrincipalId, PendingSecret>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> TrustError {
    TrustError::configuration("pending secret store lock poisoned")
}

impl SecretStore for InMemorySecretStore {
    fn put(&self, principal_id: PrincipalId, pending: PendingSecret) -> TrustResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(principal_id, pending);
        Ok(())
    }

    fn get(&self, principal_id: PrincipalId) -> TrustResult<Option<PendingSecret>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&principal_id).cloned())
    }

    fn remove(&self, principal_id: PrincipalId) -> TrustResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.remove(&principal_id);
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> TrustResult<usize> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let before = map.len();
        map.retain(|_, pending| !pending.is_expired(now));
        Ok(before - map.len())
    }
}

/// Hide most of a contact address for display in receipts and logs.
///
/// `jdoe@example.com` becomes `j***@example.com`; anything else keeps its last
/// four characters.
pub fn mask_contact(contact: &str) -> String {
    if let Some((local, domain)) = contact.split_once('@') {
        let first: String = local.chars().take(1).collect();
        return format!("{first}***@{domain}");
    }
    let count = contact.chars().count();
    let keep = count.min(4);
    let mut masked = "*".repeat(count - keep);
    masked.extend(contact.chars().skip(count - keep));
    masked
}

/// Generic deliver-then-confirm mechanism.
///
/// A secret is single use and dies after `max_attempts` wrong guesses or when
/// its TTL runs out. Expired secrets of other principals are swept on every
/// send.
pub struct DeliveredSecretMechanism {
    id: MechanismId,
    name: String,
    challenge: String,
    generator: Arc<dyn TfaSecretGenerator>,
    delivery: Arc<dyn SecretDelivery>,
    store: Arc<dyn SecretStore>,
    ttl: Duration,
    max_attempts: u32,
    clock: Clock,
}

impl DeliveredSecretMechanism {
    pub fn new(
        id: MechanismId,
        name: impl Into<String>,
        challenge: impl Into<String>,
        generator: Arc<dyn TfaSecretGenerator>,
        delivery: Arc<dyn SecretDelivery>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            challenge: challenge.into(),
            generator,
            delivery,
            store: Arc::new(InMemorySecretStore::new()),
            ttl: Duration::minutes(DEFAULT_SECRET_TTL_MINUTES),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            clock: system_clock(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Clamped to at least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl core::fmt::Debug for DeliveredSecretMechanism {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeliveredSecretMechanism")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl TfaMechanism for DeliveredSecretMechanism {
    fn id(&self) -> MechanismId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn challenge(&self) -> &str {
        &self.challenge
    }

    fn send(&self, identity: &TfaIdentity) -> TrustResult<String> {
        let contact = identity
            .contact
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                TrustError::invalid_argument(format!("principal {} has no contact for {}", identity.principal_id, self.name))
            })?;

        let now = (self.clock)();
        let purged = self.store.purge_expired(now)?;
        if purged > 0 {
            tracing::debug!(mechanism = %self.name, purged, "expired tfa secrets purged");
        }

        let secret = self.generator.generate_secret();
        let pending = PendingSecret {
            secret: secret.clone(),
            expires_at: now + self.ttl,
            failed_attempts: 0,
        };
        self.store.put(identity.principal_id, pending)?;

        if let Err(err) = self.delivery.deliver(identity, contact, &secret) {
            self.store.remove(identity.principal_id)?;
            return Err(err);
        }

        let masked = mask_contact(contact);
        tracing::info!(
            mechanism = %self.name,
            principal_id = %identity.principal_id,
            contact = %masked,
            "tfa secret issued"
        );
        Ok(format!("A verification code was sent to {masked}"))
    }

    fn validate(&self, identity: &TfaIdentity, secret: &str) -> TrustResult<bool> {
        if !self.generator.validate_secret(secret) {
            tracing::debug!(mechanism = %self.name, principal_id = %identity.principal_id, "malformed tfa secret");
            return Ok(false);
        }

        let Some(mut pending) = self.store.get(identity.principal_id)? else {
            return Ok(false);
        };

        if pending.is_expired((self.clock)()) {
            self.store.remove(identity.principal_id)?;
            tracing::debug!(mechanism = %self.name, principal_id = %identity.principal_id, "tfa secret expired");
            return Ok(false);
        }

        let matches: bool = pending.secret.as_bytes().ct_eq(secret.as_bytes()).into();
        if matches {
            self.store.remove(identity.principal_id)?;
            return Ok(true);
        }

        pending.failed_attempts += 1;
        if pending.failed_attempts >= self.max_attempts {
            self.store.remove(identity.principal_id)?;
            tracing::warn!(
                mechanism = %self.name,
                principal_id = %identity.principal_id,
                attempts = pending.failed_attempts,
                "tfa secret discarded after too many wrong guesses"
            );
        } else {
            tracing::warn!(
                mechanism = %self.name,
                principal_id = %identity.principal_id,
                attempts = pending.failed_attempts,
                "tfa secret mismatch"
            );
            self.store.put(identity.principal_id, pending)?;
        }
        Ok(false)
    }
}
