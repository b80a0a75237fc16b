//! Structural checks on stored access tokens
//!
//! Only the shape is checked; signatures are the service's business.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Decoded view of a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenShape {
    /// `exp` claim in epoch seconds, when present
    pub exp: Option<i64>,
}

/// Parse a JWT-shaped token: three non-empty dot-separated segments with a
/// base64url JSON payload. Anything else is `None`.
pub fn inspect(token: &str) -> Option<TokenShape> {
    let mut segments = token.split('.');
    let (header, payload, signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || header.is_empty() || payload.is_empty() || signature.is_empty()
    {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    Some(TokenShape { exp: claims.exp })
}

/// Short, log-safe preview of a token
pub fn preview(token: &str) -> String {
    if token.len() > 12 {
        format!("{}...", token.chars().take(8).collect::<String>())
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp));
    format!("{}.{}.sig", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exp_claim() {
        let token = fake_jwt(1_735_689_600);
        assert_eq!(inspect(&token), Some(TokenShape { exp: Some(1_735_689_600) }));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(inspect(""), None);
        assert_eq!(inspect("opaque"), None);
        assert_eq!(inspect("a.b"), None);
        assert_eq!(inspect("a..c"), None);
        assert_eq!(inspect("a.b.c.d"), None);
        assert_eq!(inspect("a.!!!.c"), None);

        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert_eq!(inspect(&format!("h.{}.s", not_json)), None);
    }

    #[test]
    fn tolerates_padding() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":12}"#);
        assert!(payload.ends_with('='));
        assert_eq!(inspect(&format!("h.{}.s", payload)), Some(TokenShape { exp: Some(12) }));
    }

    #[test]
    fn preview_hides_token() {
        assert_eq!(preview("abcdefghijklmnop"), "abcdefgh...");
        assert_eq!(preview("short"), "***");
    }
}
