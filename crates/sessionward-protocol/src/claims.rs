//! Reading the claims embedded in a bearer token.
//!
//! Access tokens are three base64url segments separated by dots:
//! `header.claims.signature`. Validity is decided by the backend; the client
//! only needs the claim segment to learn when the token expires and who it
//! belongs to, so no signature verification happens here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::ProtocolError;

/// The subset of token claims the session layer cares about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user's identifier.
    #[serde(default)]
    pub sub: Option<String>,

    /// Expiry, seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,

    /// Issued-at, seconds since the Unix epoch.
    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// Everything else in the claim segment.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decodes the claim segment of `token`.
///
/// Padding characters are tolerated even though base64url tokens normally
/// omit them.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedToken`] when the token does not have
/// three segments or the middle one is not base64url, and
/// [`ProtocolError::Decode`] when it is not a JSON object.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ProtocolError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ProtocolError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ProtocolError::MalformedToken(format!("claims segment: {e}")))?;

    serde_json::from_slice(&bytes).map_err(ProtocolError::Decode)
}

/// Builds an unsigned token (`alg: none`) carrying `claims`.
///
/// Used by the in-process development backend, which has no signing key.
pub fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

/// `true` when `text` is a JSON object with non-empty `access_token` and
/// `refresh_token` strings.
///
/// This is the well-formedness test for a storage record; it deliberately
/// ignores every other field.
pub fn record_has_tokens(text: &str) -> bool {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) else {
        return false;
    };
    let non_empty = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    non_empty("access_token") && non_empty("refresh_token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_claims_round_trips_unsigned_token() {
        let token = encode_unsigned(&json!({ "sub": "u1", "exp": 1_700_000_000, "aud": "x" }));
        let claims = decode_claims(&token).expect("should decode");
        assert_eq!(claims.sub.as_deref(), Some("u1"));
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.extra.get("aud"), Some(&json!("x")));
    }

    #[test]
    fn test_decode_claims_tolerates_padding() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":5}"#);
        assert!(payload.ends_with('='), "fixture should be padded");
        let claims = decode_claims(&format!("h.{payload}.s")).expect("should decode");
        assert_eq!(claims.exp, Some(5));
    }

    #[test]
    fn test_decode_claims_wrong_segment_count_fails() {
        assert!(matches!(
            decode_claims("only.two"),
            Err(ProtocolError::MalformedToken(_))
        ));
        assert!(matches!(
            decode_claims("a.b.c.d"),
            Err(ProtocolError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_decode_claims_non_base64_fails() {
        assert!(matches!(
            decode_claims("h.!!!.s"),
            Err(ProtocolError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_decode_claims_non_json_fails() {
        let payload = URL_SAFE_NO_PAD.encode("not json");
        assert!(matches!(
            decode_claims(&format!("h.{payload}.s")),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_record_has_tokens() {
        assert!(record_has_tokens(r#"{"access_token":"a","refresh_token":"r"}"#));
        assert!(!record_has_tokens(r#"{"access_token":"a"}"#));
        assert!(!record_has_tokens(r#"{"access_token":"","refresh_token":"r"}"#));
        assert!(!record_has_tokens(r#"{"access_token":1,"refresh_token":"r"}"#));
        assert!(!record_has_tokens("[1,2]"));
        assert!(!record_has_tokens("{not json"));
    }
}
