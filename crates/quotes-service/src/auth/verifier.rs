//! Bearer token verification.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - The signature algorithm comes from the resolved key, never the header
//! - `iss` must be on the configured allow-list
//! - `exp` is required; `exp` and `iat` are checked with clock skew tolerance
//! - Every failure produces the same `TokenInvalid` error; the reason is only
//!   logged at debug level

use crate::auth::claims::Claims;
use crate::auth::key_set::KeySetCache;
use crate::errors::QsError;
use crate::observability::metrics;
use common::jwt::{inspect_header, validate_iat};
use jsonwebtoken::{decode, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Verifies bearer tokens against the authority's key set.
pub struct TokenVerifier {
    key_set: Arc<KeySetCache>,
    issuers: Vec<String>,
    clock_skew: Duration,
}

impl TokenVerifier {
    /// # Arguments
    ///
    /// * `key_set` - Source of verification keys
    /// * `issuers` - Accepted `iss` values
    /// * `clock_skew` - Tolerance for `exp` and `iat`
    pub fn new(key_set: Arc<KeySetCache>, issuers: Vec<String>, clock_skew: Duration) -> Self {
        Self {
            key_set,
            issuers,
            clock_skew,
        }
    }

    /// Verify `token` and return its external subject id.
    ///
    /// # Errors
    ///
    /// `QsError::TokenInvalid` for every failure.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<String, QsError> {
        let result = self.verify_inner(token).await;
        metrics::record_token_validation(if result.is_ok() { "success" } else { "invalid" });
        result
    }

    async fn verify_inner(&self, token: &str) -> Result<String, QsError> {
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "qs.auth.verifier", error = ?e, "Token header inspection failed");
            QsError::TokenInvalid
        })?;

        let key = self.key_set.resolve_key(&header.kid).await.map_err(|e| {
            tracing::debug!(target: "qs.auth.verifier", kid = %header.kid, error = %e, "No verification key for token");
            QsError::TokenInvalid
        })?;

        let mut validation = Validation::new(key.algorithm);
        validation.set_issuer(&self.issuers);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = self.clock_skew.as_secs();

        let token_data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
            tracing::debug!(
                target: "qs.auth.verifier",
                error = %e,
                header_alg = %header.alg,
                key_alg = ?key.algorithm,
                "Token verification failed"
            );
            QsError::TokenInvalid
        })?;
        let claims = token_data.claims;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e| {
                tracing::debug!(target: "qs.auth.verifier", error = ?e, "Token iat validation failed");
                QsError::TokenInvalid
            })?;
        }

        let subject = claims.subject().ok_or_else(|| {
            tracing::debug!(target: "qs.auth.verifier", "Token has no subject");
            QsError::TokenInvalid
        })?;

        tracing::debug!(target: "qs.auth.verifier", "Token verified");
        Ok(subject.to_string())
    }
}
