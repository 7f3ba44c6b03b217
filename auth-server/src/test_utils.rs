//! Shared helpers for endpoint tests.

use crate::create_app;
use crate::state::tests::create_test_state;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub(crate) struct TestFixture {
    pub state: AppState,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self {
            state: create_test_state().await,
        }
    }

    pub fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    /// Basic auth header value for the seeded default client.
    pub fn client_auth(&self) -> String {
        let seed = &self.state.config.client;
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", seed.client_id, seed.client_secret))
        )
    }

    /// POST a form to the app with client Basic auth and optional extra
    /// headers, returning status and parsed JSON body.
    pub async fn post_form(
        &self,
        path: &str,
        body: &str,
        extra_headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::AUTHORIZATION, self.client_auth());
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
