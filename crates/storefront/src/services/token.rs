//! Access token payload decoding.
//!
//! Reads identifying claims out of a JWT-shaped access token. The signature
//! is NOT verified: the claims are used for display and for filling user ids
//! into request payloads, never for authorization. The services validate the
//! token on every call.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use souk_core::{Role, UserId};

/// Claims extracted from an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// The account the token was issued to.
    pub subject: UserId,
    /// Expiry (`exp`), when present.
    pub expires_at: Option<DateTime<Utc>>,
    /// Role claim, when present and recognised.
    pub role: Option<Role>,
}

/// Subject claim names, in lookup order.
const SUBJECT_CLAIMS: [&str; 4] = ["sub", "userId", "user_id", "id"];

/// Why a token could not be decoded.
#[derive(Debug, thiserror::Error)]
enum DecodeFailure {
    #[error("token is not three dot-separated segments")]
    Shape,
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not a JSON object")]
    NotObject,
    #[error("payload JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload has no subject claim")]
    MissingSubject,
}

/// Decode the claims of an access token.
///
/// Returns `None` (and logs a warning) when the token is malformed or has no
/// subject. The token itself is never logged.
#[must_use]
pub fn decode_token(token: &str) -> Option<TokenClaims> {
    match try_decode(token) {
        Ok(claims) => Some(claims),
        Err(reason) => {
            warn!(reason = %reason, "Could not decode access token");
            None
        }
    }
}

fn try_decode(token: &str) -> Result<TokenClaims, DecodeFailure> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(DecodeFailure::Shape);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let value: Value = serde_json::from_slice(&bytes)?;
    let claims = value.as_object().ok_or(DecodeFailure::NotObject)?;

    let subject = SUBJECT_CLAIMS
        .iter()
        .filter_map(|key| claims.get(*key))
        .find_map(claim_as_string)
        .map(UserId::new)
        .ok_or(DecodeFailure::MissingSubject)?;

    let expires_at = claims
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let role = claims
        .get("role")
        .and_then(Value::as_str)
        .and_then(|r| r.parse().ok());

    Ok(TokenClaims {
        subject,
        expires_at,
        role,
    })
}

/// String or integer claim values; anything else is skipped.
fn claim_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decodes_sub_and_exp() {
        let claims = decode_token(&token_with(r#"{"sub":"u-17","exp":1767225600,"role":"vendor"}"#))
            .unwrap();
        assert_eq!(claims.subject.as_str(), "u-17");
        assert_eq!(
            claims.expires_at.unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
        assert_eq!(claims.role, Some(Role::Vendor));
    }

    #[test]
    fn test_subject_lookup_order() {
        let claims = decode_token(&token_with(r#"{"id":"low","userId":"high"}"#)).unwrap();
        assert_eq!(claims.subject.as_str(), "high");

        let claims = decode_token(&token_with(r#"{"user_id":42}"#)).unwrap();
        assert_eq!(claims.subject.as_str(), "42");
    }

    #[test]
    fn test_missing_exp_is_none() {
        let claims = decode_token(&token_with(r#"{"sub":"u1"}"#)).unwrap();
        assert!(claims.expires_at.is_none());
        assert!(claims.role.is_none());
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"sub":"u1"}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(decode_token(&token).unwrap().subject.as_str(), "u1");
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(decode_token("").is_none());
        assert!(decode_token("only.two").is_none());
        assert!(decode_token("a.b.c.d").is_none());
        assert!(decode_token("h.!!!.s").is_none());
        assert!(decode_token(&token_with("[1,2]")).is_none());
        assert!(decode_token(&token_with(r#"{"name":"no subject"}"#)).is_none());
        assert!(decode_token(&token_with(r#"{"sub":""}"#)).is_none());
    }
}
