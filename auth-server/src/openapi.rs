use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const OAUTH_TAG: &str = "OAuth 2.0 API";
pub(crate) const CAPTCHA_TAG: &str = "Captcha API";

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = OAUTH_TAG, description = "Token issuance, introspection, and revocation endpoints"),
        (name = CAPTCHA_TAG, description = "One-time verification code endpoints"),
    ),
    info(
        title = "Authorization Server API",
        description = "OAuth 2.0 authorization server with password, mobile, and email grants",
        version = "1.0.0"
    )
)]
pub(crate) struct ApiDoc;
