//! Session registry used to derive the OIDC `sid` claim.
//!
//! Sessions are tracked per principal; ID token issuance picks the session
//! with the most recent request time and hashes its id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub last_request: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Vec<SessionInfo>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, principal_name: &str, session_id: &str) {
        self.register_at(principal_name, session_id, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        principal_name: &str,
        session_id: &str,
        last_request: DateTime<Utc>,
    ) {
        let mut sessions = self.sessions.write().await;
        let entries = sessions.entry(principal_name.to_string()).or_default();
        match entries.iter_mut().find(|s| s.session_id == session_id) {
            Some(entry) => entry.last_request = last_request,
            None => entries.push(SessionInfo {
                session_id: session_id.to_string(),
                last_request,
            }),
        }
    }

    /// The principal's most recently active session, if any.
    pub async fn latest(&self, principal_name: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .get(principal_name)?
            .iter()
            .max_by_key(|s| s.last_request)
            .cloned()
    }
}

/// SHA-256 of the session id, base64url-encoded without padding. Used as the
/// `sid` claim so the raw session id never leaves the server.
pub fn session_id_hash(session_id: &str) -> String {
    let digest = Sha256::digest(session_id.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_latest_picks_most_recent_request() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry.register_at("alice", "older", now - Duration::minutes(5)).await;
        registry.register_at("alice", "newer", now).await;

        let latest = registry.latest("alice").await.unwrap();
        assert_eq!(latest.session_id, "newer");
    }

    #[tokio::test]
    async fn test_register_updates_existing_session() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry.register_at("alice", "s1", now - Duration::minutes(5)).await;
        registry.register_at("alice", "s2", now - Duration::minutes(1)).await;
        registry.register_at("alice", "s1", now).await;

        let latest = registry.latest("alice").await.unwrap();
        assert_eq!(latest.session_id, "s1");
        assert_eq!(latest.last_request, now);
    }

    #[tokio::test]
    async fn test_latest_for_unknown_principal() {
        let registry = SessionRegistry::new();
        assert!(registry.latest("nobody").await.is_none());
    }

    #[test]
    fn test_session_id_hash_is_stable_and_urlsafe() {
        let hash = session_id_hash("session-1");
        assert_eq!(hash, session_id_hash("session-1"));
        assert_ne!(hash, session_id_hash("session-2"));
        assert!(!hash.contains('='));
        assert!(!hash.contains('+'));
        assert!(!hash.contains('/'));
        // SHA-256 digest is 32 bytes, 43 chars unpadded
        assert_eq!(hash.len(), 43);
    }
}
