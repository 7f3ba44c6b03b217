//! Request and response bodies for the OAuth 2.0 endpoints.

use crate::grant::IssuedGrant;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Successful token response (RFC 6749 section 5.1)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// The access token string
    pub access_token: String,
    /// "Bearer", or "DPoP" for sender-constrained tokens
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Granted scopes (space-separated)
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl From<IssuedGrant> for TokenResponse {
    fn from(grant: IssuedGrant) -> Self {
        let expires_in = (grant.access_token.expires_at - Utc::now()).num_seconds().max(0);
        Self {
            access_token: grant.access_token.value,
            token_type: grant.access_token_type.as_str().to_string(),
            expires_in,
            scope: grant.scopes.iter().cloned().collect::<Vec<_>>().join(" "),
            refresh_token: grant.refresh_token.map(|t| t.value),
            id_token: grant.id_token.map(|t| t.value),
        }
    }
}

/// Token introspection response (RFC 7662 section 2.2)
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl IntrospectionResponse {
    /// The response for an unknown, expired, or revoked token. Nothing but
    /// `active` is disclosed.
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Response to a captcha delivery request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CaptchaResponse {
    /// Lifetime of the delivered code in seconds
    pub expires_in: u64,
}
