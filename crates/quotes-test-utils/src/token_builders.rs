//! Builder for test token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Issuer the in-process app trusts.
pub const TEST_ISSUER: &str = "https://auth.quotes.test";

/// Builder for JWT claims, valid by default.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_subject("ext-1")
///     .expires_in(3600)
///     .build();
/// let token = keypair.sign(&claims);
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    iss: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
}

impl TestTokenBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some("test-subject".to_string()),
            iss: Some(TEST_ISSUER.to_string()),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: Some(now.timestamp()),
        }
    }

    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    pub fn without_issuer(mut self) -> Self {
        self.iss = None;
        self
    }

    /// Expiry in seconds from now; negative values produce expired tokens.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    pub fn build(self) -> Value {
        let mut claims = Map::new();
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        if let Some(iss) = self.iss {
            claims.insert("iss".to_string(), json!(iss));
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        Value::Object(claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
