//! Step-up secret generation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Source of "now", injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Length of secrets produced by [`ClockSecretGenerator`].
pub const CLOCK_SECRET_DIGITS: usize = 4;

pub trait TfaSecretGenerator: Send + Sync {
    fn generate_secret(&self) -> String;

    /// Format check only; says nothing about whether the secret was issued.
    fn validate_secret(&self, secret: &str) -> bool;
}

fn is_digits(secret: &str, len: usize) -> bool {
    secret.len() == len && secret.bytes().all(|b| b.is_ascii_digit())
}

/// Four digits taken from the sub-second part of the clock (100ns ticks).
///
/// This is NOT a TOTP: two calls within the same tick produce the same value
/// and an observer who knows the issue time can narrow the secret down. Use
/// [`RandomSecretGenerator`] unless compatibility requires this one.
#[derive(Clone)]
pub struct ClockSecretGenerator {
    clock: Clock,
}

impl ClockSecretGenerator {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for ClockSecretGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ClockSecretGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClockSecretGenerator").finish_non_exhaustive()
    }
}

impl TfaSecretGenerator for ClockSecretGenerator {
    fn generate_secret(&self) -> String {
        let ticks = (self.clock)().timestamp_subsec_nanos() / 100;
        format!("{:04}", ticks % 10_000)
    }

    fn validate_secret(&self, secret: &str) -> bool {
        is_digits(secret, CLOCK_SECRET_DIGITS)
    }
}

/// Uniformly random decimal digits from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomSecretGenerator {
    digits: usize,
}

impl RandomSecretGenerator {
    /// `digits` is clamped to at least one.
    pub fn new(digits: usize) -> Self {
        Self { digits: digits.max(1) }
    }

    pub fn digits(&self) -> usize {
        self.digits
    }
}

impl Default for RandomSecretGenerator {
    fn default() -> Self {
        Self::new(6)
    }
}

impl TfaSecretGenerator for RandomSecretGenerator {
    fn generate_secret(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.digits)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    fn validate_secret(&self, secret: &str) -> bool {
        is_digits(secret, self.digits)
    }
}
