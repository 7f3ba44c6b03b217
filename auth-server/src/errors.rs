use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

/// RFC 6749 section 5.2 error URI attached to token-request failures.
pub const ACCESS_TOKEN_REQUEST_ERROR_URI: &str =
    "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";

/// OAuth 2.0 error codes surfaced by the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidScope,
    InvalidClient,
    InvalidGrant,
    InvalidDpopProof,
    UnsupportedGrantType,
    ServerError,
}

impl OAuthErrorCode {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// OAuth 2.0 error response body (RFC 6749 section 5.2).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OAuthError {
    pub error: OAuthErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthError {
    pub fn new<S: ToString>(error: OAuthErrorCode, description: S) -> Self {
        Self {
            error,
            error_description: Some(description.to_string()),
            error_uri: Some(ACCESS_TOKEN_REQUEST_ERROR_URI.to_string()),
        }
    }

    /// Error for a missing or malformed request parameter.
    pub fn invalid_request<S: ToString>(parameter: S) -> Self {
        Self::new(
            OAuthErrorCode::InvalidRequest,
            format!("OAuth 2.0 Parameter: {}", parameter.to_string()),
        )
    }

    pub fn invalid_scope() -> Self {
        Self::new(OAuthErrorCode::InvalidScope, "OAuth 2.0 Parameter: scope")
    }

    pub fn invalid_client() -> Self {
        Self {
            error: OAuthErrorCode::InvalidClient,
            error_description: None,
            error_uri: None,
        }
    }

    /// Uniform credential failure. The message deliberately does not
    /// distinguish an unknown user from a bad credential.
    pub fn invalid_grant() -> Self {
        Self::new(OAuthErrorCode::InvalidGrant, "Invalid credentials.")
    }

    pub fn account_status() -> Self {
        Self::new(
            OAuthErrorCode::InvalidGrant,
            "User account status is not valid.",
        )
    }

    pub fn invalid_dpop_proof() -> Self {
        Self {
            error: OAuthErrorCode::InvalidDpopProof,
            error_description: None,
            error_uri: None,
        }
    }

    pub fn unsupported_grant_type() -> Self {
        Self::new(
            OAuthErrorCode::UnsupportedGrantType,
            "OAuth 2.0 Parameter: grant_type",
        )
    }

    pub fn server_error<S: ToString>(description: S) -> Self {
        Self::new(OAuthErrorCode::ServerError, description)
    }
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{:?}: {}", self.error, description),
            None => write!(f, "{:?}", self.error),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.error.status_code();
        (status_code, Json(self)).into_response()
    }
}
