//! `trustcore-service`: composition root of the trust & access-control core.
//!
//! [`TrustContext`] ties the decision engine, signing, password hashing,
//! symmetric encryption and the TFA relay together behind one immutable
//! object built from [`TrustConfig`].

pub mod config;
pub mod context;

pub use config::TrustConfig;
pub use context::{TrustContext, TrustContextBuilder};

/// Process bootstrap: install the tracing subscriber, then build a context
/// from the environment.
pub fn bootstrap() -> anyhow::Result<TrustContext> {
    trustcore_observability::init();
    TrustContext::from_env()
}
