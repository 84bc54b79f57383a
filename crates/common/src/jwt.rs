//! JWT utilities shared by the quotes crates.
//!
//! Everything here runs BEFORE a signature is checked, so it must stay cheap
//! and must never trust what it reads beyond picking a key:
//! - size limit applied before any decoding
//! - header inspection (`kid`, `alg`) for key-set lookup
//! - `iat` sanity check with clock skew tolerance
//! - raw Ed25519 public key decoding from a JWK `x` member
//!
//! Error values all render the same generic message. The precise reason is
//! only visible at debug level in the logs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted JWT size in bytes (8KB).
///
/// Tokens issued by the authority are a few hundred bytes. Anything larger is
/// rejected before base64 decoding or signature work is attempted.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance for `exp` / `iat` checks (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for a configured clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Reasons a token is rejected before signature verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenShapeError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Not three dot-separated segments, bad base64url, or bad header JSON.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Header carries no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// `iat` lies beyond the allowed clock skew.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header inspection
// =============================================================================

/// The unverified parts of a JWT header needed to pick a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key id naming the signing key inside the authority's key set.
    pub kid: String,

    /// Declared signing algorithm (e.g. `RS256`, `EdDSA`). Informational:
    /// the verifier pins the algorithm from the key, not from the header.
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    alg: Option<String>,
}

/// Decode the header segment of `token` without verifying anything.
///
/// # Errors
///
/// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` if the token is not `header.payload.signature`, or the
///   header is not base64url-encoded JSON
/// - `MissingKid` if `kid` is absent, empty, or not a string
pub fn inspect_header(token: &str) -> Result<TokenHeader, TokenShapeError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenShapeError::TokenTooLarge);
    }

    let mut segments = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(TokenShapeError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        TokenShapeError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        TokenShapeError::MalformedToken
    })?;

    let kid = header
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(TokenShapeError::MissingKid)?;

    Ok(TokenHeader {
        kid,
        alg: header.alg.unwrap_or_default(),
    })
}

// =============================================================================
// Claim checks
// =============================================================================

/// Reject tokens whose `iat` lies more than `clock_skew` in the future.
///
/// # Errors
///
/// Returns `TokenShapeError::IatTooFarInFuture` when `iat > now + clock_skew`.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), TokenShapeError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

/// Deterministic variant of [`validate_iat`] against an explicit `now`.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), TokenShapeError> {
    let clock_skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(TokenShapeError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode an Ed25519 public key from a JWK `x` member (base64url, no padding).
///
/// # Errors
///
/// Returns `base64::DecodeError` if the value is not valid base64url.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        format!("{}.payload.signature", URL_SAFE_NO_PAD.encode(header))
    }

    fn header_kid(token: &str) -> Result<String, TokenShapeError> {
        inspect_header(token).map(|header| header.kid)
    }

    #[test]
    fn test_inspect_header_returns_kid_and_alg() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"authority-2024"}"#);

        let header = inspect_header(&token).unwrap();
        assert_eq!(header.kid, "authority-2024");
        assert_eq!(header.alg, "RS256");
    }

    #[test]
    fn test_inspect_header_without_alg_defaults_to_empty() {
        let token = token_with_header(r#"{"kid":"k1"}"#);
        assert_eq!(inspect_header(&token).unwrap().alg, "");
    }

    #[test]
    fn test_inspect_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"EdDSA","typ":"JWT"}"#);
        assert_eq!(header_kid(&token), Err(TokenShapeError::MissingKid));
    }

    #[test]
    fn test_inspect_header_rejects_non_string_and_empty_kid() {
        for header in [
            r#"{"alg":"EdDSA","kid":12345}"#,
            r#"{"alg":"EdDSA","kid":null}"#,
            r#"{"alg":"EdDSA","kid":""}"#,
        ] {
            assert_eq!(
                header_kid(&token_with_header(header)),
                Err(TokenShapeError::MissingKid),
                "header {header} should be rejected"
            );
        }
    }

    #[test]
    fn test_inspect_header_malformed_structure() {
        for token in ["", "single", "only.two", "not.a.valid.jwt", ".payload.signature"] {
            assert_eq!(
                header_kid(token),
                Err(TokenShapeError::MalformedToken),
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_inspect_header_invalid_base64_and_json() {
        assert_eq!(
            header_kid("!!!invalid!!!.payload.signature"),
            Err(TokenShapeError::MalformedToken)
        );
        assert_eq!(
            header_kid(&token_with_header("not-json")),
            Err(TokenShapeError::MalformedToken)
        );
    }

    #[test]
    fn test_inspect_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(header_kid(&oversized), Err(TokenShapeError::TokenTooLarge));
    }

    #[test]
    fn test_inspect_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(remaining / 2),
            "b".repeat(remaining - remaining / 2)
        );

        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);
        assert_eq!(header_kid(&token).unwrap(), "key");
    }

    #[test]
    fn test_validate_iat_within_and_beyond_skew() {
        let now = 1_700_000_000;
        let skew = Duration::from_secs(300);

        assert!(validate_iat_at(now - 3600, skew, now).is_ok());
        assert!(validate_iat_at(now, skew, now).is_ok());
        assert!(validate_iat_at(now + 300, skew, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 301, skew, now),
            Err(TokenShapeError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now + 86_400, DEFAULT_CLOCK_SKEW).is_err());
    }

    #[test]
    fn test_decode_ed25519_public_key_jwk() {
        let encoded = URL_SAFE_NO_PAD.encode([7u8; 32]);
        assert_eq!(decode_ed25519_public_key_jwk(&encoded).unwrap(), vec![7u8; 32]);
        assert!(decode_ed25519_public_key_jwk("!!!invalid!!!").is_err());
    }

    #[test]
    fn test_error_messages_are_uniform() {
        let messages: Vec<String> = [
            TokenShapeError::TokenTooLarge,
            TokenShapeError::MalformedToken,
            TokenShapeError::MissingKid,
            TokenShapeError::IatTooFarInFuture,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert!(messages.iter().all(|m| m == "The access token is invalid or expired"));
    }
}
