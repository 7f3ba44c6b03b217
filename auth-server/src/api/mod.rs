pub(crate) mod captcha;
pub(crate) mod health;
pub(crate) mod oauth2;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(oauth2::router())
        .merge(captcha::router())
}
