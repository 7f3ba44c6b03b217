use serde::Deserialize;

/// Configuration for token issuance
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// Issuer identifier placed in the `iss` claim and used as the base of
    /// the DPoP request URI
    #[serde(default)]
    pub issuer: String,

    /// HMAC secret for signing access and ID tokens
    #[serde(default)]
    pub signing_secret: String,

    /// Access token lifetime in seconds (default: 30 minutes)
    #[serde(default)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds; 0 disables refresh tokens
    /// (default: 30 days)
    #[serde(default)]
    pub refresh_token_ttl: u64,

    /// ID token lifetime in seconds (default: 30 minutes)
    #[serde(default)]
    pub id_token_ttl: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:9000".to_string(),
            signing_secret: String::new(),
            access_token_ttl: 1800,
            refresh_token_ttl: 2_592_000,
            id_token_ttl: 1800,
        }
    }
}
