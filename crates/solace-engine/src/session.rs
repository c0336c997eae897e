//! Session identity.

use solace_core::types::Session;
use tracing::info;

/// Owns the current session identity.
///
/// Identifiers are allocated fresh on construction and again on every
/// restart; they are never persisted or reused across runs.
#[derive(Debug)]
pub struct SessionManager {
    current: Session,
}

impl SessionManager {
    pub fn new() -> Self {
        let current = Session::new();
        info!(
            session_id = %current.session_id,
            conversation_id = %current.conversation_id,
            "session started"
        );
        Self { current }
    }

    pub fn current(&self) -> Session {
        self.current.clone()
    }

    /// Discard the current identity and mint a fresh one.
    pub fn restart(&mut self) -> Session {
        let fresh = Session::new();
        info!(
            old = %self.current.session_id,
            new = %fresh.session_id,
            "session restarted"
        );
        self.current = fresh;
        self.current()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_fresh_per_manager() {
        let a = SessionManager::new();
        let b = SessionManager::new();
        assert_ne!(a.current().session_id, b.current().session_id);
        assert_ne!(a.current().conversation_id, b.current().conversation_id);
    }

    #[test]
    fn test_restart_mints_new_identity() {
        let mut manager = SessionManager::new();
        let before = manager.current();
        let after = manager.restart();
        assert_ne!(before.session_id, after.session_id);
        assert_ne!(before.conversation_id, after.conversation_id);
        assert_eq!(manager.current().session_id, after.session_id);
    }
}
