use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use rsa::RsaPrivateKey;

use trustcore_auth::{
    ClaimType, FixedOutcomeHandler, GrantRule, InMemoryPolicyCatalog, OutcomeReason, PolicyIdentifier, PolicyInstance,
    Principal, SecurableRef, well_known,
};
use trustcore_core::{MechanismId, SecurableId, TrustError, TrustResult};
use trustcore_crypto::config::{CertificateFindType, CertificateReference, SigningAlgorithm, SigningKeyConfig};
use trustcore_crypto::{
    Certificate, ConfigWarning, HashingAlgorithm, HkdfKeyStretch, InMemoryCertificateStore, SecurityConfig,
    SigningContext, AesSymmetricProvider,
};
use trustcore_service::{TrustConfig, TrustContext};
use trustcore_tfa::{DeliveredSecretMechanism, RandomSecretGenerator, SecretDelivery, TfaIdentity};

static RSA_KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("failed to generate test RSA key")
});

const HMAC_SECRET: &str = "0123456789abcdef0123456789abcdef";

fn pid(s: &str) -> PolicyIdentifier {
    PolicyIdentifier::parse(s.to_string()).unwrap()
}

fn certificate() -> Certificate {
    Certificate::from_private_key("CN=trustcore-signing", RSA_KEY.clone()).unwrap()
}

fn security_config(thumbprint: &str) -> SecurityConfig {
    SecurityConfig {
        signing_keys: vec![
            SigningKeyConfig {
                key_name: None,
                algorithm: SigningAlgorithm::Hs256,
                secret: Some(HMAC_SECRET.to_string()),
                certificate: None,
            },
            SigningKeyConfig {
                key_name: Some("jwt".into()),
                algorithm: SigningAlgorithm::Rs256,
                secret: None,
                certificate: Some(CertificateReference {
                    store: "My".into(),
                    find_type: CertificateFindType::Thumbprint,
                    find_value: thumbprint.to_string(),
                }),
            },
            SigningKeyConfig {
                key_name: Some("archive".into()),
                algorithm: SigningAlgorithm::Rs512,
                secret: None,
                certificate: Some(CertificateReference {
                    store: "my".into(),
                    find_type: CertificateFindType::SubjectName,
                    find_value: "trustcore-signing".into(),
                }),
            },
        ],
        password_hashing: HashingAlgorithm::Sha256,
        context_secret: Some("an-adequately-long-context-secret".into()),
    }
}

/// Records deliveries instead of sending anything.
#[derive(Default)]
struct Outbox(Mutex<Vec<(String, String)>>);

impl Outbox {
    fn last(&self) -> (String, String) {
        self.0.lock().unwrap().last().cloned().expect("nothing delivered")
    }
}

impl SecretDelivery for Outbox {
    fn deliver(&self, _identity: &TfaIdentity, contact: &str, secret: &str) -> TrustResult<()> {
        self.0.lock().unwrap().push((contact.to_string(), secret.to_string()));
        Ok(())
    }
}

struct Fixture {
    context: TrustContext,
    outbox: Arc<Outbox>,
    email_mechanism: MechanismId,
    chart: SecurableRef,
    clerk: Principal,
    physician: Principal,
}

fn fixture() -> Fixture {
    let cert = certificate();
    let thumbprint = cert.thumbprint().to_string();
    let store = InMemoryCertificateStore::new().with_certificate("my", cert);

    let clerk = Principal::user("clerk").with_role("front-desk");
    let physician = Principal::user("dr-who")
        .with_role("clinician")
        .with_claim(ClaimType::Email, "who@tardis.example");

    let chart = SecurableRef::new(SecurableId::new(), "patient-chart");

    let catalog = InMemoryPolicyCatalog::new()
        .with_role_policy("front-desk", PolicyInstance::new(well_known::LOGIN, GrantRule::Grant))
        .with_role_policy(
            "front-desk",
            PolicyInstance::new(well_known::UNRESTRICTED_CLINICAL_DATA, GrantRule::Elevate).overridable(true),
        )
        .with_role_policy("clinician", PolicyInstance::new(well_known::UNRESTRICTED_ALL, GrantRule::Grant))
        .with_principal_policy(
            physician.id,
            PolicyInstance::new(well_known::UNRESTRICTED_ADMINISTRATION, GrantRule::Deny).named("no admin"),
        )
        .with_securable_policy(
            chart.id,
            PolicyInstance::new(well_known::UNRESTRICTED_CLINICAL_DATA, GrantRule::Grant).overridable(true),
        )
        .with_securable_policy(chart.id, PolicyInstance::new(well_known::LOGIN, GrantRule::Grant));

    let outbox = Arc::new(Outbox::default());
    let email_mechanism = MechanismId::new();
    let mechanism = DeliveredSecretMechanism::new(
        email_mechanism,
        "email",
        "Enter the code sent to your e-mail address",
        Arc::new(RandomSecretGenerator::new(6)),
        outbox.clone(),
    );

    let config = TrustConfig {
        security: security_config(&thumbprint),
        ..TrustConfig::default()
    };

    let context = TrustContext::builder(config)
        .catalog(Arc::new(catalog))
        .certificates(Arc::new(store))
        .mechanism(Arc::new(mechanism))
        .build()
        .expect("context builds");

    Fixture {
        context,
        outbox,
        email_mechanism,
        chart,
        clerk,
        physician,
    }
}

#[test]
fn well_configured_context_has_no_warnings() {
    let f = fixture();
    assert!(f.context.warnings().is_empty(), "{:?}", f.context.warnings());
}

#[test]
fn outcomes_follow_policy_hierarchy() {
    let f = fixture();

    assert_eq!(
        f.context.policy_outcome(&f.clerk, well_known::LOGIN.as_str()).unwrap(),
        GrantRule::Grant
    );
    assert_eq!(
        f.context
            .policy_outcome(&f.clerk, well_known::ELEVATE_CLINICAL_DATA.as_str())
            .unwrap(),
        GrantRule::Elevate
    );
    // Nothing covers administration for the clerk: fail closed.
    assert_eq!(
        f.context
            .policy_outcome(&f.clerk, well_known::UNRESTRICTED_ADMINISTRATION.as_str())
            .unwrap(),
        GrantRule::Deny
    );

    // Root grant from the role, but the more specific direct Deny wins.
    assert_eq!(
        f.context
            .policy_outcome(&f.physician, "1.3.6.1.4.1.33349.3.1.5.9.2.0.7")
            .unwrap(),
        GrantRule::Deny
    );
    assert_eq!(
        f.context.policy_outcome(&f.physician, well_known::LOGIN.as_str()).unwrap(),
        GrantRule::Grant
    );
}

#[test]
fn granted_policy_claim_short_circuits() {
    let f = fixture();
    let service = Principal::user("batch").with_claim(ClaimType::GrantedPolicy, well_known::UNRESTRICTED_ALL.as_str());

    let explanation = f
        .context
        .explain_outcome(&service, well_known::UNRESTRICTED_ADMINISTRATION.as_str())
        .unwrap();
    assert_eq!(explanation.outcome, GrantRule::Grant);
    assert_eq!(explanation.reason, OutcomeReason::ClaimGrant);
    assert!(explanation.candidates.is_empty());
}

#[test]
fn malformed_policy_id_is_invalid_argument() {
    let f = fixture();
    for bad in ["", "1..2", " 1.2"] {
        let err = f.context.policy_outcome(&f.clerk, bad).unwrap_err();
        assert!(matches!(err, TrustError::InvalidArgument(_)), "{bad:?}: {err}");
    }
}

#[test]
fn explanation_serializes_for_audit() {
    let f = fixture();
    let explanation = f
        .context
        .explain_outcome(&f.physician, well_known::UNRESTRICTED_ADMINISTRATION.as_str())
        .unwrap();
    assert_eq!(explanation.winner, Some(well_known::UNRESTRICTED_ADMINISTRATION));

    let json = serde_json::to_value(&explanation).unwrap();
    assert_eq!(json["outcome"], "deny");
    assert_eq!(json["candidates"].as_array().unwrap().len(), 2);
}

#[test]
fn securable_decision_lists_each_protective_policy() {
    let f = fixture();

    let decision = f.context.policy_decision(&f.physician, &f.chart).unwrap();
    assert_eq!(decision.details.len(), 2);
    assert_eq!(decision.outcome(), GrantRule::Grant);

    // The clerk only holds Elevate on clinical data; the chart allows override.
    let decision = f.context.policy_decision(&f.clerk, &f.chart).unwrap();
    assert_eq!(decision.details[0].policy, well_known::UNRESTRICTED_CLINICAL_DATA);
    assert_eq!(decision.details[0].rule, GrantRule::Elevate);
    assert_eq!(decision.details[1].rule, GrantRule::Grant);
    assert_eq!(decision.outcome(), GrantRule::Elevate);

    // A securable with nothing attached is unprotected.
    let bare = SecurableRef::new(SecurableId::new(), "note");
    let decision = f.context.policy_decision(&f.clerk, &bare).unwrap();
    assert!(decision.details.is_empty());
    assert_eq!(decision.outcome(), GrantRule::Grant);
}

#[test]
fn custom_handler_decides_for_its_policy() {
    let principal = Principal::user("kiosk");
    let catalog = InMemoryPolicyCatalog::new().with_principal_policy(
        principal.id,
        PolicyInstance::new(pid("1.2.3"), GrantRule::Deny).with_handler(Arc::new(FixedOutcomeHandler(GrantRule::Grant))),
    );
    let context = TrustContext::builder(TrustConfig::default())
        .catalog(Arc::new(catalog))
        .build()
        .unwrap();

    let explanation = context.explain_outcome(&principal, "1.2.3.4").unwrap();
    assert_eq!(explanation.outcome, GrantRule::Grant);
    assert_eq!(explanation.reason, OutcomeReason::DelegatedToHandler);
}

#[test]
fn hmac_and_rsa_signatures_round_trip() {
    let f = fixture();
    let payload = b"{\"sub\":\"dr-who\"}";

    for key in [None, Some("jwt"), Some("archive")] {
        let signature = f.context.sign(payload, key).unwrap();
        assert!(f.context.verify(payload, &signature, key).unwrap(), "{key:?}");
        assert!(!f.context.verify(b"tampered", &signature, key).unwrap(), "{key:?}");
    }

    let rs256 = f.context.sign(payload, Some("jwt")).unwrap();
    let rs512 = f.context.sign(payload, Some("archive")).unwrap();
    assert_ne!(rs256, rs512);
    assert!(!f.context.verify(payload, &rs256, Some("archive")).unwrap());

    // HS256 over SHA-256 is 32 bytes.
    assert_eq!(f.context.sign(payload, None).unwrap().len(), 32);
}

#[test]
fn unknown_signing_key() {
    let f = fixture();
    let err = f.context.sign(b"data", Some("nope")).unwrap_err();
    assert!(err.is_configuration());
    assert!(!f.context.verify(b"data", b"sig", Some("nope")).unwrap());
}

#[test]
fn session_secret_overrides_configured_hmac_secret() {
    let f = fixture();
    let session = SigningContext::with_session_secret(b"per-session-secret-123".to_vec());

    let with_session = f.context.sign_with_context(b"data", None, &session).unwrap();
    let without = f.context.sign(b"data", None).unwrap();
    assert_ne!(with_session, without);
    assert!(f.context.verify_with_context(b"data", &with_session, None, &session).unwrap());
    assert!(!f.context.verify(b"data", &with_session, None).unwrap());
}

#[test]
fn missing_certificate_fails_at_startup() {
    let config = TrustConfig {
        security: security_config("00DEADBEEF"),
        ..TrustConfig::default()
    };
    let err = TrustContext::builder(config)
        .certificates(Arc::new(InMemoryCertificateStore::new().with_certificate("my", certificate())))
        .build()
        .unwrap_err();
    assert!(err.is_configuration(), "{err}");
}

#[test]
fn public_only_certificate_cannot_sign() {
    let public = Certificate::from_public_key("CN=verify-only", RSA_KEY.to_public_key()).unwrap();
    let config = TrustConfig {
        security: SecurityConfig {
            signing_keys: vec![SigningKeyConfig {
                key_name: None,
                algorithm: SigningAlgorithm::Rs256,
                secret: None,
                certificate: Some(CertificateReference {
                    store: "my".into(),
                    find_type: CertificateFindType::Thumbprint,
                    find_value: public.thumbprint().to_string(),
                }),
            }],
            ..SecurityConfig::default()
        },
        ..TrustConfig::default()
    };

    let result = TrustContext::builder(config)
        .certificates(Arc::new(InMemoryCertificateStore::new().with_certificate("my", public)))
        .build()
        .and_then(|context| context.sign(b"data", None));
    assert!(matches!(result, Err(TrustError::Configuration(_))));
}

#[test]
fn password_hashing_follows_configuration() {
    let f = fixture();
    assert_eq!(
        f.context.hash_password("password").unwrap(),
        "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
    );
    assert!(matches!(f.context.hash_password(""), Err(TrustError::InvalidArgument(_))));

    let config = TrustConfig::from_json(r#"{ "password_hashing": "md5", "context_secret": "0123456789abcdef" }"#).unwrap();
    let legacy = TrustContext::builder(config).build().unwrap();
    assert_eq!(legacy.hash_password("password").unwrap(), "5f4dcc3b5aa765d61d8327deb882cf99");
    assert_eq!(
        legacy.warnings(),
        [ConfigWarning::WeakPasswordHashing(HashingAlgorithm::Md5)]
    );
}

#[test]
fn symmetric_round_trip_and_context_key() {
    let f = fixture();
    let key = f.context.generate_key();
    let iv = f.context.generate_iv();

    let ciphertext = f.context.encrypt(b"lab results", &key, &iv).unwrap();
    assert_eq!(f.context.decrypt(&ciphertext, &key, &iv).unwrap(), b"lab results");

    // The context key is usable as an encryption key.
    let context_key = f.context.context_key();
    let ciphertext = f.context.encrypt(b"cached", &context_key[..], &iv).unwrap();
    assert_eq!(f.context.decrypt(&ciphertext, &context_key[..], &iv).unwrap(), b"cached");
}

#[test]
fn missing_context_secret_is_a_warning_not_an_error() {
    let context = TrustContext::builder(TrustConfig::default()).build().unwrap();
    assert!(context.warnings().contains(&ConfigWarning::FallbackContextSecret));
    assert_eq!(context.context_key().len(), 32);
}

#[test]
fn symmetric_provider_can_be_replaced() {
    let hkdf = TrustContext::builder(TrustConfig::default())
        .symmetric(Arc::new(AesSymmetricProvider::with_stretch(HkdfKeyStretch::new("records"), None)))
        .build()
        .unwrap();
    let tiled = TrustContext::builder(TrustConfig::default()).build().unwrap();

    let iv = hkdf.generate_iv();
    let ciphertext = hkdf.encrypt(b"payload", b"short", &iv).unwrap();
    assert!(tiled.decrypt(&ciphertext, b"short", &iv).is_err());
    assert_eq!(hkdf.decrypt(&ciphertext, b"short", &iv).unwrap(), b"payload");
}

#[test]
fn tfa_send_and_validate_through_the_relay() {
    let f = fixture();
    let mechanisms = f.context.tfa_mechanisms();
    assert_eq!(mechanisms.len(), 1);
    assert_eq!(mechanisms[0].id, f.email_mechanism);

    let identity = TrustContext::tfa_identity(&f.physician);
    assert_eq!(identity.contact.as_deref(), Some("who@tardis.example"));

    let receipt = f.context.tfa_send(f.email_mechanism, &identity).unwrap();
    assert!(receipt.contains("w***@tardis.example"));

    let (contact, secret) = f.outbox.last();
    assert_eq!(contact, "who@tardis.example");
    assert!(f.context.tfa_validate(f.email_mechanism, &identity, &secret).unwrap());
    assert!(!f.context.tfa_validate(f.email_mechanism, &identity, &secret).unwrap());
}

#[test]
fn tfa_errors() {
    let f = fixture();

    // No e-mail or telephone claim on the clerk.
    let identity = TrustContext::tfa_identity(&f.clerk);
    assert!(matches!(
        f.context.tfa_send(f.email_mechanism, &identity),
        Err(TrustError::InvalidArgument(_))
    ));

    assert!(matches!(
        f.context.tfa_send(MechanismId::new(), &identity),
        Err(TrustError::NotFound(_))
    ));
}

#[test]
fn duplicate_mechanisms_fail_at_startup() {
    let id = MechanismId::new();
    let make = || {
        Arc::new(DeliveredSecretMechanism::new(
            id,
            "sms",
            "Enter the code",
            Arc::new(RandomSecretGenerator::default()),
            Arc::new(Outbox::default()),
        ))
    };
    let err = TrustContext::builder(TrustConfig::default())
        .mechanism(make())
        .mechanism(make())
        .build()
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn context_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<TrustContext>();

    let f = Arc::new(fixture());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let f = f.clone();
            std::thread::spawn(move || {
                f.context
                    .policy_outcome(&f.clerk, well_known::LOGIN.as_str())
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), GrantRule::Grant);
    }
}
