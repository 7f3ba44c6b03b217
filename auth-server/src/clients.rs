//! Registered OAuth 2.0 clients and client authentication.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// Internal registration id, referenced by stored authorizations.
    pub id: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant_types: HashSet<String>,
    pub scopes: BTreeSet<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl RegisteredClient {
    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.contains(grant_type)
    }

    /// Refresh tokens are only issued to clients registered for the
    /// refresh_token grant.
    pub fn issues_refresh_tokens(&self) -> bool {
        self.grant_types.contains("refresh_token")
    }
}

#[derive(Clone, Default)]
pub struct ClientRepository {
    clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
}

impl ClientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, client: RegisteredClient) {
        self.clients
            .write()
            .await
            .insert(client.client_id.clone(), client);
    }

    pub async fn find_by_client_id(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    /// Authenticate a client by id and secret. Returns `None` for unknown
    /// clients and bad secrets alike.
    pub async fn authenticate(&self, client_id: &str, client_secret: &str) -> Option<RegisteredClient> {
        let client = self.find_by_client_id(client_id).await?;
        if client.client_secret == client_secret {
            Some(client)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RegisteredClient {
        RegisteredClient {
            id: "reg-1".to_string(),
            client_id: "web".to_string(),
            client_secret: "s3cret".to_string(),
            grant_types: ["password", "refresh_token"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scopes: ["openid"].iter().map(|s| s.to_string()).collect(),
            access_token_ttl: Duration::from_secs(1800),
            refresh_token_ttl: Duration::from_secs(86400),
        }
    }

    #[tokio::test]
    async fn test_authenticate() {
        let repo = ClientRepository::new();
        repo.insert(client()).await;

        assert!(repo.authenticate("web", "s3cret").await.is_some());
        assert!(repo.authenticate("web", "wrong").await.is_none());
        assert!(repo.authenticate("unknown", "s3cret").await.is_none());
    }

    #[test]
    fn test_grant_type_and_refresh_support() {
        let mut c = client();
        assert!(c.supports_grant_type("password"));
        assert!(!c.supports_grant_type("email"));
        assert!(c.issues_refresh_tokens());
        c.grant_types.remove("refresh_token");
        assert!(!c.issues_refresh_tokens());
    }
}
