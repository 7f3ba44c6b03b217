//! In-memory authorization object graph built during token issuance.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Metadata key under which a token's JWT claims are stored.
pub const CLAIMS_METADATA_KEY: &str = "claims";
/// Metadata key marking a token as invalidated.
pub const INVALIDATED_METADATA_KEY: &str = "invalidated";

/// Access token types issued by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTokenType {
    Bearer,
    Dpop,
}

impl AccessTokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Dpop => "DPoP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Bearer" => Some(Self::Bearer),
            "DPoP" => Some(Self::Dpop),
            _ => None,
        }
    }
}

/// The seven token kinds an authorization record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    State,
    AuthorizationCode,
    AccessToken,
    IdToken,
    RefreshToken,
    UserCode,
    DeviceCode,
}

impl TokenKind {
    /// Wire name, matching the OAuth2/OIDC token-type parameter values.
    pub fn value(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::AuthorizationCode => "code",
            Self::AccessToken => "access_token",
            Self::IdToken => "id_token",
            Self::RefreshToken => "refresh_token",
            Self::UserCode => "user_code",
            Self::DeviceCode => "device_code",
        }
    }

    /// Parse a token-type parameter or `token_type_hint` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "state" => Some(Self::State),
            "code" => Some(Self::AuthorizationCode),
            "access_token" => Some(Self::AccessToken),
            "id_token" => Some(Self::IdToken),
            "refresh_token" => Some(Self::RefreshToken),
            "user_code" => Some(Self::UserCode),
            "device_code" => Some(Self::DeviceCode),
            _ => None,
        }
    }
}

/// One issued token: value, validity window and free-form metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl IssuedToken {
    pub fn new(value: String, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            issued_at,
            expires_at,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Access token plus its type and the scopes it was granted with.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: IssuedToken,
    pub token_type: AccessTokenType,
    pub scopes: BTreeSet<String>,
}

/// The token bundle produced by one completed grant.
///
/// Created on successful authentication, superseded when the same principal
/// re-authenticates against the same client, deleted on revocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    pub id: String,
    pub registered_client_id: String,
    pub principal_name: String,
    pub authorization_grant_type: String,
    pub authorized_scopes: BTreeSet<String>,
    pub attributes: HashMap<String, Value>,
    pub state: Option<String>,
    pub authorization_code: Option<IssuedToken>,
    pub access_token: Option<AccessToken>,
    pub oidc_id_token: Option<IssuedToken>,
    pub refresh_token: Option<IssuedToken>,
    pub user_code: Option<IssuedToken>,
    pub device_code: Option<IssuedToken>,
}

impl Authorization {
    pub fn new(
        registered_client_id: &str,
        principal_name: &str,
        authorization_grant_type: &str,
        authorized_scopes: BTreeSet<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            registered_client_id: registered_client_id.to_string(),
            principal_name: principal_name.to_string(),
            authorization_grant_type: authorization_grant_type.to_string(),
            authorized_scopes,
            attributes: HashMap::new(),
            state: None,
            authorization_code: None,
            access_token: None,
            oidc_id_token: None,
            refresh_token: None,
            user_code: None,
            device_code: None,
        }
    }

    /// Locate which token kind carries the given value, if any.
    pub fn token_kind_of(&self, value: &str) -> Option<TokenKind> {
        if self.state.as_deref() == Some(value) {
            return Some(TokenKind::State);
        }
        let entries = [
            (TokenKind::AuthorizationCode, &self.authorization_code),
            (TokenKind::IdToken, &self.oidc_id_token),
            (TokenKind::RefreshToken, &self.refresh_token),
            (TokenKind::UserCode, &self.user_code),
            (TokenKind::DeviceCode, &self.device_code),
        ];
        if let Some(access_token) = &self.access_token {
            if access_token.token.value == value {
                return Some(TokenKind::AccessToken);
            }
        }
        entries
            .iter()
            .find(|(_, token)| matches!(token, Some(t) if t.value == value))
            .map(|(kind, _)| *kind)
    }

    /// The validity window of one token kind, if that kind was issued.
    pub fn token_window(&self, kind: TokenKind) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let token = match kind {
            TokenKind::State => return None,
            TokenKind::AuthorizationCode => self.authorization_code.as_ref(),
            TokenKind::AccessToken => self.access_token.as_ref().map(|t| &t.token),
            TokenKind::IdToken => self.oidc_id_token.as_ref(),
            TokenKind::RefreshToken => self.refresh_token.as_ref(),
            TokenKind::UserCode => self.user_code.as_ref(),
            TokenKind::DeviceCode => self.device_code.as_ref(),
        };
        token.map(|t| (t.issued_at, t.expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(value: &str) -> IssuedToken {
        let now = Utc::now();
        IssuedToken::new(value.to_string(), now, now + Duration::minutes(5))
    }

    fn authorization() -> Authorization {
        Authorization::new("client-1", "alice", "password", BTreeSet::new())
    }

    #[test]
    fn test_token_kind_of_checks_every_kind() {
        let mut auth = authorization();
        auth.state = Some("state-1".to_string());
        auth.authorization_code = Some(token("code-1"));
        auth.access_token = Some(AccessToken {
            token: token("access-1"),
            token_type: AccessTokenType::Bearer,
            scopes: BTreeSet::new(),
        });
        auth.oidc_id_token = Some(token("id-1"));
        auth.refresh_token = Some(token("refresh-1"));
        auth.user_code = Some(token("user-1"));
        auth.device_code = Some(token("device-1"));

        assert_eq!(auth.token_kind_of("state-1"), Some(TokenKind::State));
        assert_eq!(
            auth.token_kind_of("code-1"),
            Some(TokenKind::AuthorizationCode)
        );
        assert_eq!(auth.token_kind_of("access-1"), Some(TokenKind::AccessToken));
        assert_eq!(auth.token_kind_of("id-1"), Some(TokenKind::IdToken));
        assert_eq!(
            auth.token_kind_of("refresh-1"),
            Some(TokenKind::RefreshToken)
        );
        assert_eq!(auth.token_kind_of("user-1"), Some(TokenKind::UserCode));
        assert_eq!(auth.token_kind_of("device-1"), Some(TokenKind::DeviceCode));
        assert_eq!(auth.token_kind_of("unknown"), None);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(authorization().id, authorization().id);
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let issued = IssuedToken::new("t".to_string(), now, now + Duration::seconds(30));
        assert!(!issued.is_expired(now));
        assert!(issued.is_expired(now + Duration::seconds(30)));
    }
}
