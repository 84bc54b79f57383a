//! JWT claims structure.
//!
//! Only the claims the verifier checks are modelled. `sub` is redacted in
//! Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims read from a verified bearer token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// External subject id - redacted in Debug output.
    #[serde(default)]
    pub sub: Option<String>,

    /// Issuer, checked against the configured allow-list.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds), optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl Claims {
    /// The subject, when present and non-blank.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims(sub: Option<&str>) -> Claims {
        Claims {
            sub: sub.map(ToString::to_string),
            iss: "https://auth.example.com".to_string(),
            exp: 1_700_000_000,
            iat: Some(1_699_999_000),
        }
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let debug_str = format!("{:?}", claims(Some("ext-secret-42")));

        assert!(!debug_str.contains("ext-secret-42"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("https://auth.example.com"));
    }

    #[test]
    fn test_subject_rejects_missing_and_blank() {
        assert_eq!(claims(Some("ext-1")).subject(), Some("ext-1"));
        assert_eq!(claims(Some("")).subject(), None);
        assert_eq!(claims(Some("   ")).subject(), None);
        assert_eq!(claims(None).subject(), None);
    }

    #[test]
    fn test_claims_deserialize_without_optional_fields() {
        let json = r#"{"iss":"issuer","exp":1700000000}"#;
        let parsed: Claims = serde_json::from_str(json).unwrap();

        assert!(parsed.sub.is_none());
        assert!(parsed.iat.is_none());
    }
}
