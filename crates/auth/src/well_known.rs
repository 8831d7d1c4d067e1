//! Well-known policy identifiers.

use crate::policy::PolicyIdentifier;

/// Root of every policy the platform defines.
pub const UNRESTRICTED_ALL: PolicyIdentifier = PolicyIdentifier::from_static("1.3.6.1.4.1.33349.3.1.5.9.2");

/// Administrative functions (user, role and policy maintenance).
pub const UNRESTRICTED_ADMINISTRATION: PolicyIdentifier =
    PolicyIdentifier::from_static("1.3.6.1.4.1.33349.3.1.5.9.2.0");

/// Interactive login.
pub const LOGIN: PolicyIdentifier = PolicyIdentifier::from_static("1.3.6.1.4.1.33349.3.1.5.9.2.1");

/// Access to clinical data.
pub const UNRESTRICTED_CLINICAL_DATA: PolicyIdentifier =
    PolicyIdentifier::from_static("1.3.6.1.4.1.33349.3.1.5.9.2.2");

/// Break-the-glass elevation onto clinical data.
///
/// Consulted by the securable decision's elevation gate.
pub const ELEVATE_CLINICAL_DATA: PolicyIdentifier =
    PolicyIdentifier::from_static("1.3.6.1.4.1.33349.3.1.5.9.2.2.3");
