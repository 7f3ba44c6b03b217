//! Token generation for the grant pipeline.
//!
//! A single delegating generator covers the three token kinds: access and
//! ID tokens are HMAC-signed JWTs, refresh tokens are opaque random strings.
//! A generator returns `Ok(None)` when it does not produce the requested
//! kind, which the issuer reports as a generation failure.

use crate::clients::RegisteredClient;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::RngCore;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKindRequest {
    Access,
    Refresh,
    Id,
}

/// Everything a generator needs to mint one token.
pub struct TokenContext<'a> {
    pub kind: TokenKindRequest,
    pub client: &'a RegisteredClient,
    pub principal_name: &'a str,
    pub scopes: Vec<String>,
    /// JWK thumbprint of the DPoP proof key, bound into the access token's
    /// `cnf.jkt` claim when present
    pub dpop_jkt: Option<String>,
    /// Hashed session id for the ID token's `sid` claim
    pub sid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Claims of the signed token; `None` for opaque tokens
    pub claims: Option<Map<String, Value>>,
}

pub trait TokenGenerator: Send + Sync {
    fn generate(&self, context: &TokenContext<'_>) -> Result<Option<GeneratedToken>, TokenError>;
}

/// JWT generator for access and ID tokens plus opaque refresh tokens,
/// signed with the configured HMAC secret.
pub struct JwtTokenGenerator {
    issuer: String,
    encoding_key: EncodingKey,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    id_token_ttl: Duration,
}

impl JwtTokenGenerator {
    pub fn new(config: &crate::config::TokenConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            encoding_key: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            access_token_ttl: Duration::seconds(config.access_token_ttl as i64),
            refresh_token_ttl: Duration::seconds(config.refresh_token_ttl as i64),
            id_token_ttl: Duration::seconds(config.id_token_ttl as i64),
        }
    }

    fn base_claims(
        &self,
        context: &TokenContext<'_>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(self.issuer));
        claims.insert("sub".to_string(), json!(context.principal_name));
        claims.insert("aud".to_string(), json!(context.client.client_id));
        claims.insert("iat".to_string(), json!(issued_at.timestamp()));
        claims.insert("exp".to_string(), json!(expires_at.timestamp()));
        claims
    }

    fn generate_access_token(
        &self,
        context: &TokenContext<'_>,
    ) -> Result<GeneratedToken, TokenError> {
        let issued_at = Utc::now();
        let ttl = if context.client.access_token_ttl.is_zero() {
            self.access_token_ttl
        } else {
            Duration::from_std(context.client.access_token_ttl)
                .unwrap_or(self.access_token_ttl)
        };
        let expires_at = issued_at + ttl;

        let mut claims = self.base_claims(context, issued_at, expires_at);
        claims.insert("jti".to_string(), json!(uuid::Uuid::new_v4().to_string()));
        if !context.scopes.is_empty() {
            claims.insert("scope".to_string(), json!(context.scopes.join(" ")));
        }
        if let Some(jkt) = &context.dpop_jkt {
            claims.insert("cnf".to_string(), json!({ "jkt": jkt }));
        }

        let value = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(GeneratedToken {
            value,
            issued_at,
            expires_at,
            claims: Some(claims),
        })
    }

    fn generate_id_token(&self, context: &TokenContext<'_>) -> Result<GeneratedToken, TokenError> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.id_token_ttl;

        let mut claims = self.base_claims(context, issued_at, expires_at);
        if let Some(sid) = &context.sid {
            claims.insert("sid".to_string(), json!(sid));
        }

        let value = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(GeneratedToken {
            value,
            issued_at,
            expires_at,
            claims: Some(claims),
        })
    }

    fn generate_refresh_token(&self, context: &TokenContext<'_>) -> GeneratedToken {
        let issued_at = Utc::now();
        let ttl = if context.client.refresh_token_ttl.is_zero() {
            self.refresh_token_ttl
        } else {
            Duration::from_std(context.client.refresh_token_ttl)
                .unwrap_or(self.refresh_token_ttl)
        };
        GeneratedToken {
            value: generate_secure_token(),
            issued_at,
            expires_at: issued_at + ttl,
            claims: None,
        }
    }
}

impl TokenGenerator for JwtTokenGenerator {
    fn generate(&self, context: &TokenContext<'_>) -> Result<Option<GeneratedToken>, TokenError> {
        match context.kind {
            TokenKindRequest::Access => self.generate_access_token(context).map(Some),
            TokenKindRequest::Id => self.generate_id_token(context).map(Some),
            TokenKindRequest::Refresh => Ok(Some(self.generate_refresh_token(context))),
        }
    }
}

/// 256 bits of randomness, base64url-encoded without padding.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use std::collections::{BTreeSet, HashSet};

    fn client() -> RegisteredClient {
        RegisteredClient {
            id: "reg-1".to_string(),
            client_id: "web".to_string(),
            client_secret: "s3cret".to_string(),
            grant_types: HashSet::new(),
            scopes: BTreeSet::new(),
            access_token_ttl: std::time::Duration::from_secs(1800),
            refresh_token_ttl: std::time::Duration::from_secs(86400),
        }
    }

    fn generator() -> JwtTokenGenerator {
        JwtTokenGenerator::new(&crate::config::TokenConfig {
            issuer: "http://localhost:9000".to_string(),
            signing_secret: "test-signing-secret-test-signing-secret".to_string(),
            access_token_ttl: 1800,
            refresh_token_ttl: 86400,
            id_token_ttl: 1800,
        })
    }

    fn context(kind: TokenKindRequest, client: &RegisteredClient) -> TokenContext<'_> {
        TokenContext {
            kind,
            client,
            principal_name: "alice",
            scopes: vec!["openid".to_string(), "profile".to_string()],
            dpop_jkt: None,
            sid: None,
        }
    }

    fn decode_claims(token: &str) -> Map<String, Value> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        decode::<Map<String, Value>>(
            token,
            &DecodingKey::from_secret("test-signing-secret-test-signing-secret".as_bytes()),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[test]
    fn test_access_token_claims() {
        let client = client();
        let token = generator()
            .generate(&context(TokenKindRequest::Access, &client))
            .unwrap()
            .unwrap();

        let claims = decode_claims(&token.value);
        assert_eq!(claims["iss"], json!("http://localhost:9000"));
        assert_eq!(claims["sub"], json!("alice"));
        assert_eq!(claims["aud"], json!("web"));
        assert_eq!(claims["scope"], json!("openid profile"));
        assert!(claims.contains_key("jti"));
        assert!(!claims.contains_key("cnf"));
        assert!(token.claims.is_some());
    }

    #[test]
    fn test_access_token_binds_dpop_key() {
        let client = client();
        let mut ctx = context(TokenKindRequest::Access, &client);
        ctx.dpop_jkt = Some("thumbprint".to_string());
        let token = generator().generate(&ctx).unwrap().unwrap();

        let claims = decode_claims(&token.value);
        assert_eq!(claims["cnf"], json!({ "jkt": "thumbprint" }));
    }

    #[test]
    fn test_id_token_carries_sid() {
        let client = client();
        let mut ctx = context(TokenKindRequest::Id, &client);
        ctx.sid = Some("hashed-session".to_string());
        let token = generator().generate(&ctx).unwrap().unwrap();

        let claims = decode_claims(&token.value);
        assert_eq!(claims["sid"], json!("hashed-session"));
        assert!(!claims.contains_key("scope"));
    }

    #[test]
    fn test_refresh_token_is_opaque() {
        let client = client();
        let token = generator()
            .generate(&context(TokenKindRequest::Refresh, &client))
            .unwrap()
            .unwrap();

        assert!(token.claims.is_none());
        assert_eq!(token.value.len(), 43);
        assert_ne!(token.value, generate_secure_token());
    }

    #[test]
    fn test_client_ttl_overrides_default() {
        let mut client = client();
        client.access_token_ttl = std::time::Duration::from_secs(60);
        let token = generator()
            .generate(&context(TokenKindRequest::Access, &client))
            .unwrap()
            .unwrap();
        assert_eq!((token.expires_at - token.issued_at).num_seconds(), 60);
    }
}
