//! Signed session cookie
//!
//! The cookie value is `<token>.<signature>` where the signature is the
//! unpadded base64url HMAC-SHA256 of the token under the server secret.
//! A value whose signature does not verify is treated as absent.

use anyhow::Result;
use axum::http::{header, HeaderMap};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Encodes, verifies and renders the session cookie
#[derive(Clone)]
pub struct SessionCookie {
    name: String,
    mac: HmacSha256,
    secure: bool,
    max_age_secs: i64,
}

impl SessionCookie {
    /// Create a cookie codec keyed by `secret`
    pub fn new(
        name: impl Into<String>,
        secret: &[u8],
        secure: bool,
        max_age: chrono::Duration,
    ) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid cookie secret: {}", e))?;

        Ok(Self {
            name: name.into(),
            mac,
            secure,
            max_age_secs: max_age.num_seconds().max(0),
        })
    }

    fn signature(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        BASE64URL_NOPAD.encode(&mac.finalize().into_bytes())
    }

    /// Sign a session token into a cookie value
    pub fn encode(&self, token: &str) -> String {
        format!("{}.{}", token, self.signature(token))
    }

    /// Recover the token from a cookie value if its signature verifies
    pub fn decode(&self, value: &str) -> Option<String> {
        let (token, signature) = value.rsplit_once('.')?;
        if token.is_empty() {
            return None;
        }
        let signature = BASE64URL_NOPAD.decode(signature.as_bytes()).ok()?;

        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(token.to_string())
    }

    /// Find our cookie among the request's `Cookie` headers and verify it
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.name)
            .find_map(|(_, value)| self.decode(value))
    }

    /// `Set-Cookie` value establishing a session
    pub fn set_header(&self, token: &str) -> String {
        self.render(&self.encode(token), self.max_age_secs)
    }

    /// `Set-Cookie` value that makes the browser drop the cookie
    pub fn clear_header(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
            self.name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn codec(secure: bool) -> SessionCookie {
        SessionCookie::new(
            "sid",
            b"0123456789abcdef0123456789abcdef",
            secure,
            chrono::Duration::hours(1),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let cookie = codec(false);
        let value = cookie.encode("token-123");

        assert!(value.starts_with("token-123."));
        assert_eq!(cookie.decode(&value), Some("token-123".to_string()));
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let cookie = codec(false);
        let value = cookie.encode("token-123");
        let forged = value.replacen("token-123", "token-124", 1);

        assert_eq!(cookie.decode(&forged), None);
        assert_eq!(cookie.decode("token-123"), None);
        assert_eq!(cookie.decode("token-123.!!!"), None);
        assert_eq!(cookie.decode(".abc"), None);
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let other = SessionCookie::new("sid", b"another-secret-another-secret-xx", false, chrono::Duration::hours(1))
            .unwrap();
        let value = codec(false).encode("token-123");

        assert_eq!(other.decode(&value), None);
    }

    #[test]
    fn test_read_from_headers() {
        let cookie = codec(false);
        let mut headers = HeaderMap::new();
        let raw = format!("theme=dark; sid={}; lang=en", cookie.encode("abc"));
        headers.insert(header::COOKIE, HeaderValue::from_str(&raw).unwrap());

        assert_eq!(cookie.read(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_read_skips_stale_cookie_with_same_name() {
        let cookie = codec(false);
        let stale = SessionCookie::new(
            "sid",
            b"rotated-away-secret-0123456789abc",
            false,
            chrono::Duration::hours(1),
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        let raw = format!(
            "sid={}; sid={}",
            stale.encode("old"),
            cookie.encode("fresh")
        );
        headers.insert(header::COOKIE, HeaderValue::from_str(&raw).unwrap());

        assert_eq!(cookie.read(&headers), Some("fresh".to_string()));
    }

    #[test]
    fn test_read_missing_cookie() {
        let cookie = codec(false);
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));

        assert_eq!(cookie.read(&headers), None);
        assert_eq!(cookie.read(&HeaderMap::new()), None);
    }

    #[test]
    fn test_set_and_clear_headers() {
        let set = codec(false).set_header("abc");
        assert!(set.starts_with("sid=abc."));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=Strict"));
        assert!(set.contains("Max-Age=3600"));
        assert!(!set.contains("Secure"));

        let cleared = codec(true).clear_header();
        assert!(cleared.starts_with("sid=;"));
        assert!(cleared.contains("Max-Age=0"));
        assert!(cleared.ends_with("; Secure"));
    }
}
