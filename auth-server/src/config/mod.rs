pub(crate) use crate::config::captcha::CaptchaConfig;
pub(crate) use crate::config::seed::{ClientSeedConfig, UserSeedConfig};
pub(crate) use crate::config::store::{StoreBackendKind, StoreConfig};
pub(crate) use crate::config::token::TokenConfig;
use config::{Config as ConfigCrate, ConfigError};
use serde::Deserialize;

pub mod captcha;
pub mod seed;
pub mod store;
pub mod token;

/// Main configuration structure for the authorization server
#[derive(Debug, Deserialize, Clone)]
pub struct AuthServerConfig {
    /// The port the server will listen to (default: 9000)
    #[serde(default)]
    pub port: u16,

    /// Authorization persistence configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Token issuance configuration
    #[serde(default)]
    pub token: TokenConfig,

    /// One-time code configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Default client registration seeded at startup
    #[serde(default)]
    pub client: ClientSeedConfig,

    /// Default user account seeded at startup
    #[serde(default)]
    pub user: UserSeedConfig,
}

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            store: StoreConfig::default(),
            token: TokenConfig::default(),
            captcha: CaptchaConfig::default(),
            client: ClientSeedConfig::default(),
            user: UserSeedConfig::default(),
        }
    }
}

impl AuthServerConfig {
    /// Creates a new Config instance from environment variables
    pub fn new() -> Result<Self, String> {
        ConfigCrate::builder()
            .add_source(
                config::Environment::with_prefix("AUTHD")
                    .prefix_separator("_")
                    .separator("_")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            port: 0, // Let the OS choose a port
            token: TokenConfig {
                issuer: "http://localhost:9000".to_string(),
                signing_secret: "test-signing-secret-test-signing-secret".to_string(),
                access_token_ttl: 1800,
                refresh_token_ttl: 2_592_000,
                id_token_ttl: 1800,
            },
            user: UserSeedConfig {
                username: "alice".to_string(),
                password: "secret".to_string(),
                mobile: "13800000000".to_string(),
                email: "alice@example.com".to_string(),
            },
            ..Self::default()
        }
    }
}
