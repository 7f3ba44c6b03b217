//! The grant pipeline: authenticate the user behind a [`GrantRequest`],
//! mint tokens, and persist the resulting authorization.

use crate::captcha::{CaptchaChannel, CaptchaStore};
use crate::clients::RegisteredClient;
use crate::errors::OAuthError;
use crate::grant::dpop::{self, VerifiedDpopProof};
use crate::grant::request::GrantRequest;
use crate::oauth::authorization::{CLAIMS_METADATA_KEY, INVALIDATED_METADATA_KEY};
use crate::oauth::{
    AccessToken, AccessTokenType, Authorization, AuthorizationStore, ConsentRecord, ConsentStore,
    IssuedToken,
};
use crate::sessions::{session_id_hash, SessionRegistry};
use crate::token::{TokenContext, TokenGenerator, TokenKindRequest};
use crate::users::{UserDetails, UserRepository};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

const OPENID_SCOPE: &str = "openid";

/// The tokens handed back to the client after a successful grant.
#[derive(Debug, Clone)]
pub struct IssuedGrant {
    pub access_token: IssuedToken,
    pub access_token_type: AccessTokenType,
    pub scopes: BTreeSet<String>,
    pub refresh_token: Option<IssuedToken>,
    pub id_token: Option<IssuedToken>,
}

pub struct TokenIssuer {
    authorizations: AuthorizationStore,
    consents: ConsentStore,
    generator: Arc<dyn TokenGenerator>,
    sessions: Arc<SessionRegistry>,
    users: Arc<UserRepository>,
    captchas: Arc<CaptchaStore>,
}

impl TokenIssuer {
    pub fn new(
        authorizations: AuthorizationStore,
        consents: ConsentStore,
        generator: Arc<dyn TokenGenerator>,
        sessions: Arc<SessionRegistry>,
        users: Arc<UserRepository>,
        captchas: Arc<CaptchaStore>,
    ) -> Self {
        Self {
            authorizations,
            consents,
            generator,
            sessions,
            users,
            captchas,
        }
    }

    /// Run the full pipeline for an already-authenticated client.
    pub async fn issue(
        &self,
        client: &RegisteredClient,
        request: &GrantRequest,
    ) -> Result<IssuedGrant, OAuthError> {
        if !client.supports_grant_type(request.grant_type()) {
            return Err(OAuthError::invalid_client());
        }

        let requested_scopes: BTreeSet<String> = request.scopes().iter().cloned().collect();
        if !requested_scopes.is_subset(&client.scopes) {
            return Err(OAuthError::invalid_scope());
        }

        let dpop_proof = dpop::verify_if_available(request.additional_params())?;
        log::trace!("Validated token request parameters");

        let user = self.authenticate_user(request).await?;
        log::debug!("Authenticated user {}", user.username);

        let mut authorization = Authorization::new(
            &client.id,
            &user.username,
            request.grant_type(),
            requested_scopes.clone(),
        );
        authorization
            .attributes
            .insert("principal".to_string(), json!(user.username));

        let access_token =
            self.generate_access_token(client, &user, &requested_scopes, &dpop_proof)?;
        let token_type = match &dpop_proof {
            Some(_) => AccessTokenType::Dpop,
            None => AccessTokenType::Bearer,
        };
        authorization.access_token = Some(AccessToken {
            token: access_token.clone(),
            token_type,
            scopes: requested_scopes.clone(),
        });

        let refresh_token = if client.issues_refresh_tokens() {
            let token = self.generate_refresh_token(client, &user, &requested_scopes)?;
            authorization.refresh_token = Some(token.clone());
            Some(token)
        } else {
            None
        };

        let id_token = if requested_scopes.contains(OPENID_SCOPE) {
            let token = self
                .generate_id_token(client, &user, &requested_scopes)
                .await?;
            authorization.oidc_id_token = Some(token.clone());
            Some(token)
        } else {
            None
        };

        self.authorizations
            .save(&authorization)
            .await
            .map_err(|e| OAuthError::server_error(e.to_string()))?;
        log::trace!("Saved authorization {}", authorization.id);

        self.record_consent(client, &user, &requested_scopes)
            .await
            .map_err(|e| OAuthError::server_error(e.to_string()))?;

        Ok(IssuedGrant {
            access_token,
            access_token_type: token_type,
            scopes: requested_scopes,
            refresh_token,
            id_token,
        })
    }

    /// Resolve and check the user behind the request. Unknown users, bad
    /// credentials, and bad codes all fail with the same message.
    async fn authenticate_user(&self, request: &GrantRequest) -> Result<UserDetails, OAuthError> {
        let user = self
            .users
            .find_by_identifier(request.identifier())
            .await
            .ok_or_else(OAuthError::invalid_grant)?;

        let credential_ok = match request {
            GrantRequest::Password { password, .. } => user.verify_password(password),
            GrantRequest::Mobile { mobile, code, .. } => {
                self.captchas
                    .validate(CaptchaChannel::Sms, mobile, code)
                    .await
            }
            GrantRequest::Email { email, code, .. } => {
                self.captchas
                    .validate(CaptchaChannel::Email, email, code)
                    .await
            }
        };
        if !credential_ok {
            return Err(OAuthError::invalid_grant());
        }

        if !user.account_status_ok() {
            return Err(OAuthError::account_status());
        }
        Ok(user)
    }

    fn generate_access_token(
        &self,
        client: &RegisteredClient,
        user: &UserDetails,
        scopes: &BTreeSet<String>,
        dpop_proof: &Option<VerifiedDpopProof>,
    ) -> Result<IssuedToken, OAuthError> {
        let context = TokenContext {
            kind: TokenKindRequest::Access,
            client,
            principal_name: &user.username,
            scopes: scopes.iter().cloned().collect(),
            dpop_jkt: dpop_proof.as_ref().map(|proof| proof.jkt.clone()),
            sid: None,
        };
        let generated = self
            .generator
            .generate(&context)
            .map_err(|e| OAuthError::server_error(e.to_string()))?
            .ok_or_else(|| {
                OAuthError::server_error("The token generator failed to generate the access token.")
            })?;
        log::trace!("Generated access token");

        let mut token = IssuedToken::new(generated.value, generated.issued_at, generated.expires_at)
            .with_metadata(INVALIDATED_METADATA_KEY, json!(false));
        if let Some(claims) = generated.claims {
            token = token.with_metadata(CLAIMS_METADATA_KEY, Value::Object(claims));
        }
        Ok(token)
    }

    fn generate_refresh_token(
        &self,
        client: &RegisteredClient,
        user: &UserDetails,
        scopes: &BTreeSet<String>,
    ) -> Result<IssuedToken, OAuthError> {
        let context = TokenContext {
            kind: TokenKindRequest::Refresh,
            client,
            principal_name: &user.username,
            scopes: scopes.iter().cloned().collect(),
            dpop_jkt: None,
            sid: None,
        };
        let generated = self
            .generator
            .generate(&context)
            .map_err(|e| OAuthError::server_error(e.to_string()))?
            .ok_or_else(|| {
                OAuthError::server_error(
                    "The token generator failed to generate a valid refresh token.",
                )
            })?;
        log::trace!("Generated refresh token");

        Ok(
            IssuedToken::new(generated.value, generated.issued_at, generated.expires_at)
                .with_metadata(INVALIDATED_METADATA_KEY, json!(false)),
        )
    }

    /// Mint the ID token, carrying the hash of the principal's most recent
    /// session when one is registered.
    async fn generate_id_token(
        &self,
        client: &RegisteredClient,
        user: &UserDetails,
        scopes: &BTreeSet<String>,
    ) -> Result<IssuedToken, OAuthError> {
        let sid = self
            .sessions
            .latest(&user.username)
            .await
            .map(|session| session_id_hash(&session.session_id));

        let context = TokenContext {
            kind: TokenKindRequest::Id,
            client,
            principal_name: &user.username,
            scopes: scopes.iter().cloned().collect(),
            dpop_jkt: None,
            sid,
        };
        let generated = self
            .generator
            .generate(&context)
            .map_err(|e| OAuthError::server_error(e.to_string()))?
            .ok_or_else(|| {
                OAuthError::server_error("The token generator failed to generate the ID token.")
            })?;
        // An ID token must be a signed JWT with claims
        let Some(claims) = generated.claims else {
            return Err(OAuthError::server_error(
                "The token generator failed to generate the ID token.",
            ));
        };
        log::trace!("Generated id token");

        Ok(
            IssuedToken::new(generated.value, generated.issued_at, generated.expires_at)
                .with_metadata(CLAIMS_METADATA_KEY, Value::Object(claims)),
        )
    }

    /// Merge the granted scopes into the stored consent for this
    /// client/principal pair.
    async fn record_consent(
        &self,
        client: &RegisteredClient,
        user: &UserDetails,
        scopes: &BTreeSet<String>,
    ) -> Result<(), crate::store::StoreError> {
        let mut merged = scopes.clone();
        if let Some(existing) = self.consents.find(&client.id, &user.username).await? {
            merged.extend(existing.scopes);
        }
        let consent = ConsentRecord::new(&client.id, &user.username, merged);
        self.consents.save(&consent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::errors::OAuthErrorCode;
    use crate::oauth::TokenKind;
    use crate::store::memory::MemoryStore;
    use crate::store::Store;
    use crate::token::JwtTokenGenerator;
    use crate::users::hash_password;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    fn client() -> RegisteredClient {
        RegisteredClient {
            id: "reg-1".to_string(),
            client_id: "web".to_string(),
            client_secret: "s3cret".to_string(),
            grant_types: ["password", "mobile", "email", "refresh_token"]
                .iter()
                .map(|s| s.to_string())
                .collect::<HashSet<_>>(),
            scopes: ["openid", "profile"].iter().map(|s| s.to_string()).collect(),
            access_token_ttl: Duration::from_secs(1800),
            refresh_token_ttl: Duration::from_secs(86400),
        }
    }

    struct Fixture {
        issuer: TokenIssuer,
        authorizations: AuthorizationStore,
        consents: ConsentStore,
        captchas: Arc<CaptchaStore>,
        sessions: Arc<SessionRegistry>,
        users: Arc<UserRepository>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(Store::InMemory(MemoryStore::new()));
        let authorizations = AuthorizationStore::new(store.clone());
        let consents = ConsentStore::new(store);
        let generator = Arc::new(JwtTokenGenerator::new(&TokenConfig {
            issuer: "http://localhost:9000".to_string(),
            signing_secret: "test-signing-secret-test-signing-secret".to_string(),
            access_token_ttl: 1800,
            refresh_token_ttl: 86400,
            id_token_ttl: 1800,
        }));
        let sessions = Arc::new(SessionRegistry::new());
        let users = Arc::new(UserRepository::new());
        users
            .insert(
                UserDetails::new("alice")
                    .with_password_hash(&hash_password("secret").unwrap())
                    .with_mobile("13800000000")
                    .with_email("alice@example.com"),
            )
            .await;
        let captchas = Arc::new(CaptchaStore::new(Duration::from_secs(300), 6));

        let issuer = TokenIssuer::new(
            authorizations.clone(),
            consents.clone(),
            generator,
            sessions.clone(),
            users.clone(),
            captchas.clone(),
        );
        Fixture {
            issuer,
            authorizations,
            consents,
            captchas,
            sessions,
            users,
        }
    }

    fn password_request(scopes: &[&str]) -> GrantRequest {
        GrantRequest::Password {
            username: "alice".to_string(),
            password: "secret".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            additional_params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_password_grant_issues_and_persists() {
        let fx = fixture().await;
        let grant = fx
            .issuer
            .issue(&client(), &password_request(&["openid", "profile"]))
            .await
            .unwrap();

        assert_eq!(grant.access_token_type, AccessTokenType::Bearer);
        assert!(grant.refresh_token.is_some());
        assert!(grant.id_token.is_some());

        // The stored authorization is findable by each issued token value
        let stored = fx
            .authorizations
            .find_by_token(&grant.access_token.value, Some(TokenKind::AccessToken))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.principal_name, "alice");
        assert_eq!(stored.authorization_grant_type, "password");
        assert_eq!(
            stored.access_token.as_ref().unwrap().token.metadata[INVALIDATED_METADATA_KEY],
            json!(false)
        );
        assert!(stored.access_token.as_ref().unwrap().token.metadata
            [CLAIMS_METADATA_KEY]
            .is_object());

        let refresh_value = grant.refresh_token.unwrap().value;
        assert!(fx
            .authorizations
            .find_by_token(&refresh_value, Some(TokenKind::RefreshToken))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_bad_password_and_unknown_user_are_uniform() {
        let fx = fixture().await;
        let bad_password = GrantRequest::Password {
            username: "alice".to_string(),
            password: "wrong".to_string(),
            scopes: vec!["openid".to_string()],
            additional_params: HashMap::new(),
        };
        let unknown_user = GrantRequest::Password {
            username: "mallory".to_string(),
            password: "secret".to_string(),
            scopes: vec!["openid".to_string()],
            additional_params: HashMap::new(),
        };

        let e1 = fx.issuer.issue(&client(), &bad_password).await.unwrap_err();
        let e2 = fx.issuer.issue(&client(), &unknown_user).await.unwrap_err();
        assert_eq!(e1.error, OAuthErrorCode::InvalidGrant);
        assert_eq!(e1.error_description, e2.error_description);
        assert_eq!(e1.error_description.as_deref(), Some("Invalid credentials."));
    }

    #[tokio::test]
    async fn test_disabled_account_rejected_after_credential_check() {
        let fx = fixture().await;
        let mut locked = UserDetails::new("bob")
            .with_password_hash(&hash_password("secret").unwrap());
        locked.account_non_locked = false;
        fx.users.insert(locked).await;

        let request = GrantRequest::Password {
            username: "bob".to_string(),
            password: "secret".to_string(),
            scopes: vec!["openid".to_string()],
            additional_params: HashMap::new(),
        };
        let err = fx.issuer.issue(&client(), &request).await.unwrap_err();
        assert_eq!(
            err.error_description.as_deref(),
            Some("User account status is not valid.")
        );
    }

    #[tokio::test]
    async fn test_mobile_grant_consumes_captcha() {
        let fx = fixture().await;
        let code = fx.captchas.issue(CaptchaChannel::Sms, "13800000000").await;
        let request = GrantRequest::Mobile {
            mobile: "13800000000".to_string(),
            code: code.clone(),
            scopes: vec!["openid".to_string()],
            additional_params: HashMap::new(),
        };

        let grant = fx.issuer.issue(&client(), &request).await.unwrap();
        assert!(grant.id_token.is_some());

        // The code was consumed; replay fails
        let err = fx.issuer.issue(&client(), &request).await.unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidGrant);
    }

    #[tokio::test]
    async fn test_email_grant() {
        let fx = fixture().await;
        let code = fx
            .captchas
            .issue(CaptchaChannel::Email, "alice@example.com")
            .await;
        let request = GrantRequest::Email {
            email: "alice@example.com".to_string(),
            code,
            scopes: vec!["profile".to_string()],
            additional_params: HashMap::new(),
        };

        let grant = fx.issuer.issue(&client(), &request).await.unwrap();
        // No openid scope, no ID token
        assert!(grant.id_token.is_none());
    }

    #[tokio::test]
    async fn test_id_token_carries_latest_session_hash() {
        let fx = fixture().await;
        fx.sessions.register("alice", "session-1").await;

        let grant = fx
            .issuer
            .issue(&client(), &password_request(&["openid"]))
            .await
            .unwrap();
        let id_token = grant.id_token.unwrap();
        let claims = &id_token.metadata[CLAIMS_METADATA_KEY];
        assert_eq!(claims["sid"], json!(session_id_hash("session-1")));
    }

    #[tokio::test]
    async fn test_scope_outside_client_registration_rejected() {
        let fx = fixture().await;
        let err = fx
            .issuer
            .issue(&client(), &password_request(&["openid", "admin"]))
            .await
            .unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidScope);
    }

    #[tokio::test]
    async fn test_unregistered_grant_type_rejected() {
        let fx = fixture().await;
        let mut restricted = client();
        restricted.grant_types.remove("password");
        let err = fx
            .issuer
            .issue(&restricted, &password_request(&["openid"]))
            .await
            .unwrap_err();
        assert_eq!(err.error, OAuthErrorCode::InvalidClient);
    }

    #[tokio::test]
    async fn test_new_grant_supersedes_previous_authorization() {
        let fx = fixture().await;
        let first = fx
            .issuer
            .issue(&client(), &password_request(&["openid"]))
            .await
            .unwrap();
        let second = fx
            .issuer
            .issue(&client(), &password_request(&["openid"]))
            .await
            .unwrap();

        assert!(fx
            .authorizations
            .find_by_token(&first.access_token.value, Some(TokenKind::AccessToken))
            .await
            .unwrap()
            .is_none());
        assert!(fx
            .authorizations
            .find_by_token(&second.access_token.value, Some(TokenKind::AccessToken))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_consent_scopes_accumulate() {
        let fx = fixture().await;
        fx.issuer
            .issue(&client(), &password_request(&["openid"]))
            .await
            .unwrap();
        fx.issuer
            .issue(&client(), &password_request(&["profile"]))
            .await
            .unwrap();

        let consent = fx.consents.find("reg-1", "alice").await.unwrap().unwrap();
        let expected: BTreeSet<String> =
            ["openid", "profile"].iter().map(|s| s.to_string()).collect();
        assert_eq!(consent.scopes, expected);
    }
}
