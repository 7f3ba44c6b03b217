//! OAuth 2.0 endpoints: token issuance for the custom grants plus token
//! introspection (RFC 7662) and revocation (RFC 7009).

pub mod handlers;
pub mod models;

use crate::state::AppState;
use axum::routing::post;
use axum::Router;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth2/token", post(handlers::token))
        .route("/oauth2/introspect", post(handlers::introspect))
        .route("/oauth2/revoke", post(handlers::revoke))
}
