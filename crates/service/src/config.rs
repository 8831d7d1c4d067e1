//! Configuration of a [`TrustContext`](crate::TrustContext).

use serde::{Deserialize, Serialize};

use trustcore_auth::EngineOptions;
use trustcore_core::{TrustError, TrustResult};
use trustcore_crypto::SecurityConfig;
use trustcore_crypto::config::CONFIG_ENV;

/// Everything the trust core reads at startup.
///
/// The JSON form is the security document with an optional `engine` section:
///
/// ```json
/// {
///   "signing_keys": [{ "algorithm": "HS256", "secret": "..." }],
///   "password_hashing": "sha256",
///   "engine": { "default_outcome": "deny" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(flatten)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub engine: EngineOptions,
}

#[derive(Deserialize)]
struct EngineSection {
    #[serde(default)]
    engine: EngineOptions,
}

impl TrustConfig {
    pub fn from_json(json: &str) -> TrustResult<Self> {
        serde_json::from_str(json).map_err(|e| TrustError::configuration(format!("invalid trust configuration: {e}")))
    }

    pub fn from_env() -> TrustResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Security settings honour the same overrides as
    /// [`SecurityConfig::from_lookup`]; engine options come from the `engine`
    /// section of the JSON document, if any.
    pub fn from_lookup<F>(lookup: F) -> TrustResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let security = SecurityConfig::from_lookup(&lookup)?;
        let engine = match lookup(CONFIG_ENV) {
            Some(json) => {
                serde_json::from_str::<EngineSection>(&json)
                    .map_err(|e| TrustError::configuration(format!("invalid engine options: {e}")))?
                    .engine
            }
            None => EngineOptions::default(),
        };
        Ok(Self { security, engine })
    }
}
