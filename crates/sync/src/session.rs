//! Session identity observation.
//!
//! Authentication is owned elsewhere; the engines only need to see every
//! `Guest <-> Authenticated` transition. [`SessionHandle`] is the writer side
//! the auth layer drives; each engine holds a `watch::Receiver` and reacts to
//! changes in its session watcher task.

use clementine_core::{SessionIdentity, SessionToken};
use tokio::sync::watch;

/// Writer side of the session identity channel.
///
/// Cheap to clone; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: watch::Sender<SessionIdentity>,
}

impl SessionHandle {
    /// Create a handle starting in the guest state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionIdentity::guest());
        Self { tx }
    }

    /// Subscribe to identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionIdentity> {
        self.tx.subscribe()
    }

    /// The current identity.
    #[must_use]
    pub fn current(&self) -> SessionIdentity {
        self.tx.borrow().clone()
    }

    /// Transition to the authenticated state with a fresh credential.
    pub fn login(&self, credential: SessionToken) {
        self.tx
            .send_replace(SessionIdentity::authenticated(credential));
    }

    /// Transition back to the guest state, discarding the credential.
    pub fn logout(&self) {
        self.tx.send_replace(SessionIdentity::guest());
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_as_guest() {
        let session = SessionHandle::new();
        assert!(!session.current().is_authenticated);
    }

    #[tokio::test]
    async fn test_login_logout_observed() {
        let session = SessionHandle::new();
        let mut rx = session.subscribe();

        session.login(SessionToken::new("token".to_string()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_authenticated);

        session.logout();
        rx.changed().await.unwrap();
        let identity = rx.borrow_and_update().clone();
        assert!(!identity.is_authenticated);
        assert!(identity.credential.is_none());
    }
}
