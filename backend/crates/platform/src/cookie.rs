//! Cookie Management Infrastructure
//!
//! Set-Cookie construction and cookie extraction for session cookies.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};

/// SameSite policy for cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie configuration
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            path: "/".to_string(),
        }
    }
}

impl CookieConfig {
    /// Build a Set-Cookie header value.
    ///
    /// When `expires` is given both `Expires` and `Max-Age` are emitted,
    /// relative to `now`.
    pub fn build_set_cookie(
        &self,
        value: &str,
        expires: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> String {
        let mut parts = vec![
            format!("{}={}", self.name, value),
            format!("Path={}", self.path),
        ];

        if let Some(expires) = expires {
            parts.push(format!("Expires={}", http_date(expires)));
            parts.push(format!(
                "Max-Age={}",
                (expires - now).num_seconds().max(0)
            ));
        }
        self.push_flags(&mut parts);

        parts.join("; ")
    }

    /// Build a Set-Cookie header value that removes the cookie
    pub fn build_delete_cookie(&self) -> String {
        let mut parts = vec![
            format!("{}=", self.name),
            format!("Path={}", self.path),
            "Max-Age=0".to_string(),
            "Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string(),
        ];
        self.push_flags(&mut parts);

        parts.join("; ")
    }

    fn push_flags(&self, parts: &mut Vec<String>) {
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.push(format!("SameSite={}", self.same_site.as_str()));
    }
}

/// Format a timestamp as an HTTP date (IMF-fixdate)
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Extract a cookie value from headers
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;

            if key == name && !value.is_empty() {
                Some(value.to_string())
            } else {
                None
            }
        })
}

/// Create a Set-Cookie header value
pub fn set_cookie_header(cookie: &str) -> HeaderValue {
    HeaderValue::from_str(cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> CookieConfig {
        CookieConfig {
            name: "access_session".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_cookie_carries_expiry_and_flags() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let expires = now + Duration::minutes(60);

        let cookie = config().build_set_cookie("abc123", Some(expires), now);
        assert!(cookie.starts_with("access_session=abc123"));
        assert!(cookie.contains("Expires=Tue, 14 Nov 2023 23:13:20 GMT"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
    }

    #[test]
    fn test_insecure_cookie_omits_secure() {
        let config = CookieConfig {
            secure: false,
            ..config()
        };
        let cookie = config.build_set_cookie("v", None, Utc::now());
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains("Max-Age"));
    }

    #[test]
    fn test_delete_cookie() {
        let cookie = config().build_delete_cookie();
        assert!(cookie.starts_with("access_session=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("SameSite=Strict"));
    }

    #[test]
    fn test_extract_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; access_session=abc123; empty="),
        );

        assert_eq!(
            extract_cookie(&headers, "access_session"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_cookie(&headers, "foo"), Some("bar".to_string()));
        assert_eq!(extract_cookie(&headers, "empty"), None);
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }
}
