//! OAuth 2.0 endpoint handlers

use crate::api::oauth2::models::{IntrospectionResponse, TokenResponse};
use crate::clients::RegisteredClient;
use crate::errors::OAuthError;
use crate::grant::{self, TokenRequest, DPOP_HEADER};
use crate::oauth::authorization::INVALIDATED_METADATA_KEY;
use crate::oauth::{Authorization, TokenKind};
use crate::openapi::OAUTH_TAG;
use crate::state::AppState;
use axum::extract::{RawForm, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use http::StatusCode;
use log::{debug, info, warn};
use url::form_urlencoded;

/// Token endpoint for the password, mobile, and email grants
#[utoipa::path(
    post,
    path = "/oauth2/token",
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Malformed or unauthorized request", body = OAuthError),
        (status = 401, description = "Client authentication failed", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Json<TokenResponse>, OAuthError> {
    let params = parse_form(&body);
    let client = authenticate_client(&state, &headers, &params).await?;
    debug!("Authenticated client {}", client.client_id);

    let dpop_headers = dpop_header_values(&headers)?;
    let target_uri = format!("{}/oauth2/token", state.config.token.issuer);
    let request = TokenRequest {
        params: &params,
        dpop_headers: &dpop_headers,
        method: "POST",
        target_uri: &target_uri,
    };

    let Some(grant_request) = grant::convert(&request)? else {
        warn!("Unsupported grant type requested by {}", client.client_id);
        return Err(OAuthError::unsupported_grant_type());
    };

    let grant = state.issuer.issue(&client, &grant_request).await?;
    info!(
        "Issued {} tokens to {} for {}",
        grant_request.grant_type(),
        client.client_id,
        grant_request.identifier()
    );
    Ok(Json(TokenResponse::from(grant)))
}

/// Token introspection endpoint (RFC 7662)
#[utoipa::path(
    post,
    path = "/oauth2/introspect",
    responses(
        (status = 200, description = "Introspection result", body = IntrospectionResponse),
        (status = 401, description = "Client authentication failed", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn introspect(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Json<IntrospectionResponse>, OAuthError> {
    let params = parse_form(&body);
    authenticate_client(&state, &headers, &params).await?;

    let Some(token) = first_param(&params, "token") else {
        return Err(OAuthError::invalid_request("token"));
    };
    let hint = first_param(&params, "token_type_hint").and_then(TokenKind::parse);

    let found = state
        .authorizations
        .find_by_token(token, hint)
        .await
        .map_err(|e| OAuthError::server_error(e.to_string()))?;

    // Unknown tokens are reported inactive, never as errors
    let Some(authorization) = found else {
        return Ok(Json(IntrospectionResponse::inactive()));
    };
    Ok(Json(introspection_response(&authorization, token)))
}

/// Token revocation endpoint (RFC 7009)
#[utoipa::path(
    post,
    path = "/oauth2/revoke",
    responses(
        (status = 200, description = "Token revoked or unknown"),
        (status = 401, description = "Client authentication failed", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<impl IntoResponse, OAuthError> {
    let params = parse_form(&body);
    authenticate_client(&state, &headers, &params).await?;

    let Some(token) = first_param(&params, "token") else {
        return Err(OAuthError::invalid_request("token"));
    };
    let hint = first_param(&params, "token_type_hint").and_then(TokenKind::parse);

    let found = state
        .authorizations
        .find_by_token(token, hint)
        .await
        .map_err(|e| OAuthError::server_error(e.to_string()))?;
    if let Some(authorization) = found {
        state
            .authorizations
            .remove(&authorization)
            .await
            .map_err(|e| OAuthError::server_error(e.to_string()))?;
        info!("Revoked authorization {}", authorization.id);
    }
    // Revoking an unknown token still succeeds (RFC 7009 section 2.2)
    Ok(StatusCode::OK)
}

fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(body).into_owned().collect()
}

fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}

/// Authenticate the requesting client from HTTP Basic credentials or from
/// client_id/client_secret form parameters.
async fn authenticate_client(
    state: &AppState,
    headers: &HeaderMap,
    params: &[(String, String)],
) -> Result<RegisteredClient, OAuthError> {
    let credentials = basic_credentials(headers).or_else(|| {
        match (
            first_param(params, "client_id"),
            first_param(params, "client_secret"),
        ) {
            (Some(id), Some(secret)) => Some((id.to_string(), secret.to_string())),
            _ => None,
        }
    });
    let Some((client_id, client_secret)) = credentials else {
        return Err(OAuthError::invalid_client());
    };
    state
        .clients
        .authenticate(&client_id, &client_secret)
        .await
        .ok_or_else(OAuthError::invalid_client)
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some((client_id.to_string(), client_secret.to_string()))
}

fn dpop_header_values(headers: &HeaderMap) -> Result<Vec<String>, OAuthError> {
    let mut values = Vec::new();
    for value in headers.get_all(DPOP_HEADER) {
        let value = value
            .to_str()
            .map_err(|_| OAuthError::invalid_request(DPOP_HEADER))?;
        values.push(value.to_string());
    }
    Ok(values)
}

fn introspection_response(authorization: &Authorization, token: &str) -> IntrospectionResponse {
    let Some(kind) = authorization.token_kind_of(token) else {
        return IntrospectionResponse::inactive();
    };
    let Some((issued_at, expires_at)) = authorization.token_window(kind) else {
        return IntrospectionResponse::inactive();
    };
    if expires_at <= Utc::now() {
        return IntrospectionResponse::inactive();
    }

    let (token_type, invalidated) = match kind {
        TokenKind::AccessToken => {
            let access_token = authorization.access_token.as_ref();
            (
                access_token.map(|t| t.token_type.as_str().to_string()),
                access_token
                    .map(|t| {
                        t.token.metadata.get(INVALIDATED_METADATA_KEY)
                            == Some(&serde_json::json!(true))
                    })
                    .unwrap_or(false),
            )
        }
        TokenKind::RefreshToken => (
            None,
            authorization
                .refresh_token
                .as_ref()
                .map(|t| {
                    t.metadata.get(INVALIDATED_METADATA_KEY) == Some(&serde_json::json!(true))
                })
                .unwrap_or(false),
        ),
        _ => (None, false),
    };
    if invalidated {
        return IntrospectionResponse::inactive();
    }

    IntrospectionResponse {
        active: true,
        scope: Some(
            authorization
                .authorized_scopes
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
        ),
        client_id: Some(authorization.registered_client_id.clone()),
        username: Some(authorization.principal_name.clone()),
        token_type,
        exp: Some(expires_at.timestamp()),
        iat: Some(issued_at.timestamp()),
    }
}
