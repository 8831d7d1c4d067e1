//! The composition root: one immutable object owning every trust-core service.

use std::sync::Arc;

use zeroize::Zeroizing;

use trustcore_auth::{
    ClaimType, GrantRule, InMemoryPolicyCatalog, OutcomeExplanation, PolicyCatalog, PolicyDecision,
    PolicyDecisionEngine, Principal, SecurableRef,
};
use trustcore_core::{MechanismId, TrustResult};
use trustcore_crypto::symmetric::KEY_LEN;
use trustcore_crypto::{
    AesSymmetricProvider, CertificateStore, ConfigWarning, InMemoryCertificateStore, PasswordHasher, SigningContext,
    SigningKeyRegistry, SigningService, SymmetricCryptoProvider, password_hasher,
};
use trustcore_tfa::{TfaIdentity, TfaMechanism, TfaMechanismInfo, TfaRelay};

use crate::config::TrustConfig;

/// Built once at startup and shared by reference (or `Arc`) afterwards.
pub struct TrustContext {
    engine: PolicyDecisionEngine<Arc<dyn PolicyCatalog>>,
    signing: SigningService,
    hasher: Arc<dyn PasswordHasher>,
    symmetric: Arc<dyn SymmetricCryptoProvider>,
    relay: TfaRelay,
    warnings: Vec<ConfigWarning>,
}

impl TrustContext {
    pub fn builder(config: TrustConfig) -> TrustContextBuilder {
        TrustContextBuilder::new(config)
    }

    /// Configuration from the environment, no policies, no certificates and no
    /// TFA mechanisms. Embedders with real collaborators use [`Self::builder`].
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let config = TrustConfig::from_env().context("failed to load trust configuration")?;
        let context = Self::builder(config)
            .build()
            .context("failed to initialize trust context")?;
        Ok(context)
    }

    /// Non-fatal findings of the startup validation pass.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    // Authorization

    pub fn policy_outcome(&self, principal: &Principal, policy_id: &str) -> TrustResult<GrantRule> {
        self.engine.policy_outcome(principal, policy_id)
    }

    pub fn explain_outcome(&self, principal: &Principal, policy_id: &str) -> TrustResult<OutcomeExplanation> {
        self.engine.explain_outcome(principal, policy_id)
    }

    pub fn policy_decision(&self, principal: &Principal, securable: &SecurableRef) -> TrustResult<PolicyDecision> {
        self.engine.policy_decision(principal, securable)
    }

    // Signing

    pub fn sign(&self, data: &[u8], key_id: Option<&str>) -> TrustResult<Vec<u8>> {
        self.signing.sign(data, key_id)
    }

    pub fn sign_with_context(&self, data: &[u8], key_id: Option<&str>, context: &SigningContext) -> TrustResult<Vec<u8>> {
        self.signing.sign_with_context(data, key_id, context)
    }

    pub fn verify(&self, data: &[u8], signature: &[u8], key_id: Option<&str>) -> TrustResult<bool> {
        self.signing.verify(data, signature, key_id)
    }

    pub fn verify_with_context(
        &self,
        data: &[u8],
        signature: &[u8],
        key_id: Option<&str>,
        context: &SigningContext,
    ) -> TrustResult<bool> {
        self.signing.verify_with_context(data, signature, key_id, context)
    }

    // Hashing and symmetric encryption

    pub fn hash_password(&self, password: &str) -> TrustResult<String> {
        self.hasher.compute_hash(password)
    }

    pub fn encrypt(&self, data: &[u8], key: &[u8], iv: &[u8]) -> TrustResult<Vec<u8>> {
        self.symmetric.encrypt(data, key, iv)
    }

    pub fn decrypt(&self, data: &[u8], key: &[u8], iv: &[u8]) -> TrustResult<Vec<u8>> {
        self.symmetric.decrypt(data, key, iv)
    }

    pub fn generate_key(&self) -> Vec<u8> {
        self.symmetric.generate_key()
    }

    pub fn generate_iv(&self) -> Vec<u8> {
        self.symmetric.generate_iv()
    }

    pub fn context_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        self.symmetric.context_key()
    }

    // Two-factor

    /// Identity for step-up delivery; the contact is the principal's first
    /// e-mail claim, else its first telephone claim.
    pub fn tfa_identity(principal: &Principal) -> TfaIdentity {
        let identity = TfaIdentity::new(principal.id, principal.name.clone());
        match principal
            .claims
            .first(&ClaimType::Email)
            .or_else(|| principal.claims.first(&ClaimType::Telephone))
        {
            Some(contact) => identity.with_contact(contact),
            None => identity,
        }
    }

    pub fn tfa_mechanisms(&self) -> Vec<TfaMechanismInfo> {
        self.relay.mechanisms()
    }

    pub fn tfa_send(&self, mechanism_id: MechanismId, identity: &TfaIdentity) -> TrustResult<String> {
        self.relay.send_secret(mechanism_id, identity)
    }

    pub fn tfa_validate(&self, mechanism_id: MechanismId, identity: &TfaIdentity, secret: &str) -> TrustResult<bool> {
        self.relay.validate_secret(mechanism_id, identity, secret)
    }
}

impl core::fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TrustContext")
            .field("engine_options", self.engine.options())
            .field("signing", &self.signing)
            .field("hasher", &self.hasher)
            .field("relay", &self.relay)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

/// Collects the external collaborators, then validates everything at once.
pub struct TrustContextBuilder {
    config: TrustConfig,
    catalog: Option<Arc<dyn PolicyCatalog>>,
    certificates: Arc<dyn CertificateStore>,
    symmetric: Option<Arc<dyn SymmetricCryptoProvider>>,
    mechanisms: Vec<Arc<dyn TfaMechanism>>,
}

impl TrustContextBuilder {
    pub fn new(config: TrustConfig) -> Self {
        Self {
            config,
            catalog: None,
            certificates: Arc::new(InMemoryCertificateStore::new()),
            symmetric: None,
            mechanisms: Vec::new(),
        }
    }

    pub fn catalog(mut self, catalog: Arc<dyn PolicyCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn certificates(mut self, store: Arc<dyn CertificateStore>) -> Self {
        self.certificates = store;
        self
    }

    /// Replaces the AES provider derived from the configured context secret.
    pub fn symmetric(mut self, provider: Arc<dyn SymmetricCryptoProvider>) -> Self {
        self.symmetric = Some(provider);
        self
    }

    pub fn mechanism(mut self, mechanism: Arc<dyn TfaMechanism>) -> Self {
        self.mechanisms.push(mechanism);
        self
    }

    /// Fails on the first fatal configuration problem: invalid key settings,
    /// unresolvable certificates, duplicate TFA mechanisms.
    pub fn build(self) -> TrustResult<TrustContext> {
        let TrustConfig { security, engine } = self.config;

        let warnings = security.validate()?;

        let signing = SigningService::new(SigningKeyRegistry::from_config(&security)?, self.certificates);
        signing.validate_keys()?;

        let catalog: Arc<dyn PolicyCatalog> = match self.catalog {
            Some(catalog) => catalog,
            None => {
                tracing::warn!("no policy catalog configured; every request resolves to the default outcome");
                Arc::new(InMemoryPolicyCatalog::new())
            }
        };

        let symmetric: Arc<dyn SymmetricCryptoProvider> = match self.symmetric {
            Some(provider) => provider,
            None => Arc::new(AesSymmetricProvider::new(security.context_secret.clone())),
        };

        let relay = TfaRelay::new(self.mechanisms)?;

        tracing::info!(
            signing_keys = signing.keys().len(),
            password_hashing = %security.password_hashing,
            tfa_mechanisms = relay.len(),
            warnings = warnings.len(),
            "trust context initialized"
        );

        Ok(TrustContext {
            engine: PolicyDecisionEngine::with_options(catalog, engine),
            signing,
            hasher: password_hasher(security.password_hashing),
            symmetric,
            relay,
            warnings,
        })
    }
}
