//! Wiremock stand-in for the identity authority.
//!
//! Serves the JWKS document at `/jwks` and display-name lookups at
//! `/users/{subject}`.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct MockAuthority {
    pub server: MockServer,
}

impl MockAuthority {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/jwks", self.server.uri())
    }

    /// Publish `keys` at `/jwks`.
    pub async fn mount_jwks(&self, keys: &[&TestKeypair]) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Answer the lookup of `subject` with `full_name`.
    pub async fn mount_user(&self, subject: &str, full_name: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{subject}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "id": subject, "fullName": full_name }
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer the lookup of `subject` with 404.
    pub async fn mount_unknown_user(&self, subject: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{subject}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the authority received on `request_path`.
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}
