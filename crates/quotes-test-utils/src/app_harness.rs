//! In-process application harness.
//!
//! Builds the full router over an [`InMemoryStore`] with the authority
//! mocked by wiremock, and drives it with `tower::ServiceExt::oneshot`.

use crate::crypto_fixtures::TestKeypair;
use crate::mock_authority::MockAuthority;
use crate::token_builders::{TestTokenBuilder, TEST_ISSUER};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::secret::SecretString;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusHandle;
use quotes_service::auth::{KeySetCache, KeySetConfig, TokenVerifier};
use quotes_service::cache::DEFAULT_REGION_CAPACITY;
use quotes_service::observability::metrics::init_metrics_recorder;
use quotes_service::repositories::InMemoryStore;
use quotes_service::routes::{build_routes, AppState};
use quotes_service::services::HttpAuthorityClient;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::ServiceExt;

static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Shared Prometheus handle; the global recorder installs once per process.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// The full application over in-memory storage.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<InMemoryStore>,
    pub authority: MockAuthority,
    pub keypair: TestKeypair,
}

impl TestApp {
    /// Start the mock authority publishing one signing key and build the app.
    pub async fn spawn() -> Self {
        let authority = MockAuthority::start().await;
        let keypair = TestKeypair::new(42, "quotes-test-key");
        authority.mount_jwks(&[&keypair]).await;

        let store = Arc::new(InMemoryStore::new());
        let key_set = Arc::new(KeySetCache::new(KeySetConfig::new(authority.jwks_url())));
        let verifier = Arc::new(TokenVerifier::new(
            key_set,
            vec![TEST_ISSUER.to_string()],
            Duration::from_secs(300),
        ));
        let authority_client = Arc::new(
            HttpAuthorityClient::new(
                authority.base_url(),
                Some("quotes-api".to_string()),
                Some(SecretString::from("authority-pw")),
                Duration::from_secs(5),
            )
            .expect("authority client should build"),
        );

        let state = Arc::new(AppState::new(
            store.clone(),
            store.clone(),
            store.clone(),
            verifier,
            authority_client,
            DEFAULT_REGION_CAPACITY,
        ));
        let router = build_routes(Arc::clone(&state), test_metrics_handle());

        Self {
            router,
            state,
            store,
            authority,
            keypair,
        }
    }

    /// Valid token for `subject`.
    pub fn token_for(&self, subject: &str) -> String {
        self.keypair
            .sign(&TestTokenBuilder::new().for_subject(subject).build())
    }

    /// Mount `subject` at the authority and return a token for it.
    pub async fn login(&self, subject: &str, full_name: &str) -> String {
        self.authority.mount_user(subject, full_name).await;
        self.token_for(subject)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Send one request; the body is parsed as JSON, `Null` when empty or
    /// not JSON.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(build_request(method, uri, token, body))
            .await
            .expect("router should respond");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

        (status, json)
    }

    /// Send one request and return the raw response.
    pub async fn send_raw(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }
}

pub fn build_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}
