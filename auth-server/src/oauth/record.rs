//! Flat persisted form of an [`Authorization`] and the conversion between
//! the two shapes.
//!
//! Every optional token group round-trips through an explicit presence
//! check on its value field: a kind was issued iff its `*_value` column is
//! non-blank. This keeps the persisted JSON stable across backends and lets
//! partially populated records (say, a device flow that issued no access
//! token yet) survive unchanged.

use crate::oauth::authorization::{
    AccessToken, AccessTokenType, Authorization, IssuedToken, TokenKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationRecord {
    pub id: String,
    pub registered_client_id: String,
    pub principal_name: String,
    pub authorization_grant_type: String,
    pub authorized_scopes: BTreeSet<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code_metadata: Option<HashMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_metadata: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_scopes: Option<BTreeSet<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_id_token_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_id_token_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_id_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_id_token_metadata: Option<HashMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_metadata: Option<HashMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code_metadata: Option<HashMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_code_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_code_issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_code_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_code_metadata: Option<HashMap<String, Value>>,
}

fn has_value(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some(v) if !v.trim().is_empty())
}

fn token_fields(
    token: &Option<IssuedToken>,
) -> (
    Option<String>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<HashMap<String, Value>>,
) {
    match token {
        Some(token) => (
            Some(token.value.clone()),
            Some(token.issued_at),
            Some(token.expires_at),
            Some(token.metadata.clone()),
        ),
        None => (None, None, None, None),
    }
}

fn read_token(
    value: &Option<String>,
    issued_at: &Option<DateTime<Utc>>,
    expires_at: &Option<DateTime<Utc>>,
    metadata: &Option<HashMap<String, Value>>,
) -> Option<IssuedToken> {
    if !has_value(value) {
        return None;
    }
    let (Some(issued_at), Some(expires_at)) = (issued_at, expires_at) else {
        return None;
    };
    Some(IssuedToken {
        value: value.clone().unwrap_or_default(),
        issued_at: *issued_at,
        expires_at: *expires_at,
        metadata: metadata.clone().unwrap_or_default(),
    })
}

impl AuthorizationRecord {
    /// Flatten an authorization graph into its persisted form.
    pub fn from_authorization(authorization: &Authorization) -> Self {
        let (authorization_code_value, authorization_code_issued_at, authorization_code_expires_at, authorization_code_metadata) =
            token_fields(&authorization.authorization_code);
        let (oidc_id_token_value, oidc_id_token_issued_at, oidc_id_token_expires_at, oidc_id_token_metadata) =
            token_fields(&authorization.oidc_id_token);
        let (refresh_token_value, refresh_token_issued_at, refresh_token_expires_at, refresh_token_metadata) =
            token_fields(&authorization.refresh_token);
        let (user_code_value, user_code_issued_at, user_code_expires_at, user_code_metadata) =
            token_fields(&authorization.user_code);
        let (device_code_value, device_code_issued_at, device_code_expires_at, device_code_metadata) =
            token_fields(&authorization.device_code);

        let mut record = Self {
            id: authorization.id.clone(),
            registered_client_id: authorization.registered_client_id.clone(),
            principal_name: authorization.principal_name.clone(),
            authorization_grant_type: authorization.authorization_grant_type.clone(),
            authorized_scopes: authorization.authorized_scopes.clone(),
            attributes: authorization.attributes.clone(),
            state: authorization.state.clone(),
            authorization_code_value,
            authorization_code_issued_at,
            authorization_code_expires_at,
            authorization_code_metadata,
            oidc_id_token_value,
            oidc_id_token_issued_at,
            oidc_id_token_expires_at,
            oidc_id_token_metadata,
            refresh_token_value,
            refresh_token_issued_at,
            refresh_token_expires_at,
            refresh_token_metadata,
            user_code_value,
            user_code_issued_at,
            user_code_expires_at,
            user_code_metadata,
            device_code_value,
            device_code_issued_at,
            device_code_expires_at,
            device_code_metadata,
            ..Self::default()
        };

        if let Some(access_token) = &authorization.access_token {
            record.access_token_value = Some(access_token.token.value.clone());
            record.access_token_issued_at = Some(access_token.token.issued_at);
            record.access_token_expires_at = Some(access_token.token.expires_at);
            record.access_token_metadata = Some(access_token.token.metadata.clone());
            record.access_token_type = Some(access_token.token_type.as_str().to_string());
            record.access_token_scopes = Some(access_token.scopes.clone());
        }

        record
    }

    /// Rebuild the authorization graph from its persisted form.
    pub fn into_authorization(self) -> Authorization {
        let access_token = if has_value(&self.access_token_value) {
            read_token(
                &self.access_token_value,
                &self.access_token_issued_at,
                &self.access_token_expires_at,
                &self.access_token_metadata,
            )
            .map(|token| AccessToken {
                token,
                token_type: self
                    .access_token_type
                    .as_deref()
                    .and_then(AccessTokenType::parse)
                    .unwrap_or(AccessTokenType::Bearer),
                scopes: self.access_token_scopes.clone().unwrap_or_default(),
            })
        } else {
            None
        };

        Authorization {
            id: self.id,
            registered_client_id: self.registered_client_id,
            principal_name: self.principal_name,
            authorization_grant_type: self.authorization_grant_type,
            authorized_scopes: self.authorized_scopes,
            attributes: self.attributes,
            state: self.state.filter(|state| !state.trim().is_empty()),
            authorization_code: read_token(
                &self.authorization_code_value,
                &self.authorization_code_issued_at,
                &self.authorization_code_expires_at,
                &self.authorization_code_metadata,
            ),
            access_token,
            oidc_id_token: read_token(
                &self.oidc_id_token_value,
                &self.oidc_id_token_issued_at,
                &self.oidc_id_token_expires_at,
                &self.oidc_id_token_metadata,
            ),
            refresh_token: read_token(
                &self.refresh_token_value,
                &self.refresh_token_issued_at,
                &self.refresh_token_expires_at,
                &self.refresh_token_metadata,
            ),
            user_code: read_token(
                &self.user_code_value,
                &self.user_code_issued_at,
                &self.user_code_expires_at,
                &self.user_code_metadata,
            ),
            device_code: read_token(
                &self.device_code_value,
                &self.device_code_issued_at,
                &self.device_code_expires_at,
                &self.device_code_metadata,
            ),
        }
    }

    /// Whether the record holds the given token value under the given kind,
    /// or under any kind when `kind` is `None`.
    pub fn has_token(&self, value: &str, kind: Option<TokenKind>) -> bool {
        let matches = |field: &Option<String>| field.as_deref() == Some(value);
        match kind {
            None => {
                matches(&self.state)
                    || matches(&self.authorization_code_value)
                    || matches(&self.access_token_value)
                    || matches(&self.oidc_id_token_value)
                    || matches(&self.refresh_token_value)
                    || matches(&self.device_code_value)
                    || matches(&self.user_code_value)
            }
            Some(TokenKind::State) => matches(&self.state),
            Some(TokenKind::AuthorizationCode) => matches(&self.authorization_code_value),
            Some(TokenKind::AccessToken) => matches(&self.access_token_value),
            Some(TokenKind::IdToken) => matches(&self.oidc_id_token_value),
            Some(TokenKind::RefreshToken) => matches(&self.refresh_token_value),
            Some(TokenKind::UserCode) => matches(&self.user_code_value),
            Some(TokenKind::DeviceCode) => matches(&self.device_code_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn token(value: &str) -> IssuedToken {
        let now = Utc::now();
        IssuedToken::new(value.to_string(), now, now + Duration::minutes(30))
            .with_metadata("invalidated", json!(false))
    }

    fn base() -> Authorization {
        let scopes: BTreeSet<String> = ["openid", "profile"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut authorization = Authorization::new("client-1", "alice", "password", scopes);
        authorization
            .attributes
            .insert("principal".to_string(), json!("alice"));
        authorization
    }

    #[test]
    fn test_round_trip_full_record() {
        let mut authorization = base();
        authorization.state = Some("state-1".to_string());
        authorization.authorization_code = Some(token("code-1"));
        authorization.access_token = Some(AccessToken {
            token: token("access-1").with_metadata("claims", json!({"sub": "alice"})),
            token_type: AccessTokenType::Dpop,
            scopes: authorization.authorized_scopes.clone(),
        });
        authorization.oidc_id_token = Some(token("id-1"));
        authorization.refresh_token = Some(token("refresh-1"));
        authorization.user_code = Some(token("user-1"));
        authorization.device_code = Some(token("device-1"));

        let record = AuthorizationRecord::from_authorization(&authorization);
        let restored = record.into_authorization();
        assert_eq!(restored, authorization);
    }

    #[test]
    fn test_round_trip_partial_record() {
        // Only access + refresh tokens populated; everything else must stay
        // absent through a full convert/serialize/parse/convert cycle.
        let mut authorization = base();
        authorization.access_token = Some(AccessToken {
            token: token("access-2"),
            token_type: AccessTokenType::Bearer,
            scopes: authorization.authorized_scopes.clone(),
        });
        authorization.refresh_token = Some(token("refresh-2"));

        let record = AuthorizationRecord::from_authorization(&authorization);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: AuthorizationRecord = serde_json::from_str(&json).unwrap();
        let restored = parsed.into_authorization();

        assert_eq!(restored, authorization);
        assert!(restored.state.is_none());
        assert!(restored.authorization_code.is_none());
        assert!(restored.oidc_id_token.is_none());
        assert!(restored.user_code.is_none());
        assert!(restored.device_code.is_none());
    }

    #[test]
    fn test_blank_value_means_absent() {
        let mut record = AuthorizationRecord::from_authorization(&base());
        record.refresh_token_value = Some("  ".to_string());
        record.refresh_token_issued_at = Some(Utc::now());
        record.refresh_token_expires_at = Some(Utc::now());

        let restored = record.into_authorization();
        assert!(restored.refresh_token.is_none());
    }

    #[test]
    fn test_has_token_is_kind_specific() {
        let mut authorization = base();
        authorization.access_token = Some(AccessToken {
            token: token("shared-value"),
            token_type: AccessTokenType::Bearer,
            scopes: BTreeSet::new(),
        });
        let record = AuthorizationRecord::from_authorization(&authorization);

        assert!(record.has_token("shared-value", Some(TokenKind::AccessToken)));
        // Must not match on a different kind even for an equal value
        assert!(!record.has_token("shared-value", Some(TokenKind::RefreshToken)));
        assert!(record.has_token("shared-value", None));
    }
}
