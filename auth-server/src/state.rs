use crate::captcha::CaptchaStore;
use crate::clients::{ClientRepository, RegisteredClient};
use crate::config::AuthServerConfig;
use crate::grant::TokenIssuer;
use crate::oauth::{AuthorizationStore, ConsentStore};
use crate::sessions::SessionRegistry;
use crate::store::{create_store, Store, StoreBackend};
use crate::token::JwtTokenGenerator;
use crate::users::{hash_password, UserDetails, UserRepository};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthServerConfig>,
    pub store: Arc<Store>,
    pub authorizations: AuthorizationStore,
    pub consents: ConsentStore,
    pub clients: Arc<ClientRepository>,
    pub users: Arc<UserRepository>,
    pub sessions: Arc<SessionRegistry>,
    pub captchas: Arc<CaptchaStore>,
    pub issuer: Arc<TokenIssuer>,
}

impl AppState {
    pub async fn new(config: AuthServerConfig) -> Result<Self, std::io::Error> {
        let store = create_store(&config).await.map_err(|e| {
            std::io::Error::other(format!("Failed to create store: {e}"))
        })?;
        let state = Self::with_existing_store(config, store);
        state.seed().await?;
        Ok(state)
    }

    pub fn with_existing_store(config: AuthServerConfig, store: Store) -> Self {
        let store = Arc::new(store);
        let authorizations = AuthorizationStore::new(store.clone());
        let consents = ConsentStore::new(store.clone());
        let clients = Arc::new(ClientRepository::new());
        let users = Arc::new(UserRepository::new());
        let sessions = Arc::new(SessionRegistry::new());
        let captchas = Arc::new(CaptchaStore::new(
            Duration::from_secs(config.captcha.ttl),
            config.captcha.code_length,
        ));
        let generator = Arc::new(JwtTokenGenerator::new(&config.token));
        let issuer = Arc::new(TokenIssuer::new(
            authorizations.clone(),
            consents.clone(),
            generator,
            sessions.clone(),
            users.clone(),
            captchas.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            authorizations,
            consents,
            clients,
            users,
            sessions,
            captchas,
            issuer,
        }
    }

    /// Register the configured default client and user.
    async fn seed(&self) -> Result<(), std::io::Error> {
        let seed = &self.config.client;
        self.clients
            .insert(RegisteredClient {
                id: format!("registration-{}", seed.client_id),
                client_id: seed.client_id.clone(),
                client_secret: seed.client_secret.clone(),
                grant_types: seed.grant_type_list().into_iter().collect(),
                scopes: seed.scope_list().into_iter().collect(),
                access_token_ttl: Duration::from_secs(self.config.token.access_token_ttl),
                refresh_token_ttl: Duration::from_secs(self.config.token.refresh_token_ttl),
            })
            .await;

        let user_seed = &self.config.user;
        if !user_seed.username.is_empty() {
            let password_hash = hash_password(&user_seed.password).map_err(|e| {
                std::io::Error::other(format!("Failed to hash seed password: {e}"))
            })?;
            let mut user =
                UserDetails::new(&user_seed.username).with_password_hash(&password_hash);
            if !user_seed.mobile.is_empty() {
                user = user.with_mobile(&user_seed.mobile);
            }
            if !user_seed.email.is_empty() {
                user = user.with_email(&user_seed.email);
            }
            self.users.insert(user).await;
        }
        Ok(())
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> bool {
        self.store.health_check().await.is_ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    pub(crate) async fn create_test_state() -> AppState {
        let state = AppState::with_existing_store(
            AuthServerConfig::for_test(),
            Store::InMemory(MemoryStore::new()),
        );
        state.seed().await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_state_seeds_default_client_and_user() {
        let state = create_test_state().await;
        let config = state.config.clone();

        let client = state
            .clients
            .find_by_client_id(&config.client.client_id)
            .await
            .unwrap();
        assert!(client.supports_grant_type("password"));

        let user = state
            .users
            .find_by_identifier(&config.user.username)
            .await
            .unwrap();
        assert!(user.verify_password(&config.user.password));
    }

    #[tokio::test]
    async fn test_state_health_check() {
        let state = create_test_state().await;
        assert!(state.health_check().await);
    }

    #[test]
    fn test_state_clone_shares_components() {
        let state = AppState::with_existing_store(
            AuthServerConfig::for_test(),
            Store::InMemory(MemoryStore::new()),
        );
        let state2 = state.clone();
        assert_eq!(Arc::as_ptr(&state.config), Arc::as_ptr(&state2.config));
        assert_eq!(Arc::as_ptr(&state.issuer), Arc::as_ptr(&state2.issuer));
    }
}
