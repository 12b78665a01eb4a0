//! Session identity types.
//!
//! The synchronization engine does not own authentication; it only observes
//! `is_authenticated` transitions. The credential is opaque to the engine and
//! is attached to outgoing requests by the transport layer.

use serde::{Deserialize, Serialize};

/// An opaque bearer credential.
///
/// Implements `Debug` manually to redact the token value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token string.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Expose the raw token, e.g. for the transport layer to attach.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}

/// The authentication state the engine observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Whether the user is logged in.
    pub is_authenticated: bool,
    /// The bearer credential, present iff authenticated.
    pub credential: Option<SessionToken>,
}

impl SessionIdentity {
    /// An anonymous session.
    #[must_use]
    pub const fn guest() -> Self {
        Self {
            is_authenticated: false,
            credential: None,
        }
    }

    /// A logged-in session carrying its credential.
    #[must_use]
    pub const fn authenticated(credential: SessionToken) -> Self {
        Self {
            is_authenticated: true,
            credential: Some(credential),
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::guest()
    }
}
