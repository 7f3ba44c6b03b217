//! Endpoints that issue one-time codes for the mobile and email grants.
//!
//! Delivery is out of scope here: the generated code is handed to the log
//! in place of an SMS or mail gateway.

use crate::api::oauth2::models::CaptchaResponse;
use crate::captcha::CaptchaChannel;
use crate::errors::OAuthError;
use crate::openapi::CAPTCHA_TAG;
use crate::state::AppState;
use axum::extract::{Form, State};
use axum::routing::post;
use axum::{Json, Router};
use log::info;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SmsCaptchaRequest {
    pub mobile: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailCaptchaRequest {
    pub email: String,
}

/// Send an SMS verification code
#[utoipa::path(
    post,
    path = "/captcha/sms",
    request_body(content = SmsCaptchaRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Code issued", body = CaptchaResponse),
        (status = 400, description = "Missing destination", body = OAuthError)
    ),
    tag = CAPTCHA_TAG
)]
async fn sms_captcha(
    State(state): State<AppState>,
    Form(request): Form<SmsCaptchaRequest>,
) -> Result<Json<CaptchaResponse>, OAuthError> {
    if request.mobile.trim().is_empty() {
        return Err(OAuthError::invalid_request("mobile"));
    }
    let code = state
        .captchas
        .issue(CaptchaChannel::Sms, &request.mobile)
        .await;
    info!("SMS captcha for {}: {}", request.mobile, code);
    Ok(Json(CaptchaResponse {
        expires_in: state.config.captcha.ttl,
    }))
}

/// Send an email verification code
#[utoipa::path(
    post,
    path = "/captcha/email",
    request_body(content = EmailCaptchaRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Code issued", body = CaptchaResponse),
        (status = 400, description = "Missing destination", body = OAuthError)
    ),
    tag = CAPTCHA_TAG
)]
async fn email_captcha(
    State(state): State<AppState>,
    Form(request): Form<EmailCaptchaRequest>,
) -> Result<Json<CaptchaResponse>, OAuthError> {
    if request.email.trim().is_empty() {
        return Err(OAuthError::invalid_request("email"));
    }
    let code = state
        .captchas
        .issue(CaptchaChannel::Email, &request.email)
        .await;
    info!("Email captcha for {}: {}", request.email, code);
    Ok(Json(CaptchaResponse {
        expires_in: state.config.captcha.ttl,
    }))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/captcha/sms", post(sms_captcha))
        .route("/captcha/email", post(email_captcha))
}
