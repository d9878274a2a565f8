//! A single cookie and the `Set-Cookie` header it renders to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    #[serde(alias = "strict")]
    Strict,
    #[serde(alias = "lax")]
    Lax,
    #[serde(alias = "none")]
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        f.write_str(value)
    }
}

/// Cookie to be sent with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Cookie that tells the client to drop `name`.
    pub fn expired(name: impl Into<String>) -> Self {
        let mut cookie = Self::new(name, "");
        cookie.max_age = Some(0);
        cookie.expires = DateTime::<Utc>::from_timestamp(0, 0);
        cookie
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.domain = (!domain.is_empty()).then_some(domain);
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self.expires = Some(Utc::now() + chrono::Duration::seconds(seconds));
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Value of the `Set-Cookie` header for this cookie.
    pub fn to_header(&self) -> String {
        let mut header = format!("{}={}", self.name, urlencoding::encode(&self.value));

        if let Some(path) = &self.path {
            header.push_str("; Path=");
            header.push_str(path);
        }
        if let Some(domain) = &self.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }
        if let Some(expires) = &self.expires {
            header.push_str("; Expires=");
            header.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            header.push_str(&format!("; SameSite={}", same_site));
        }
        header
    }

    /// Parse a `Set-Cookie` header line back into a cookie.
    ///
    /// Unknown attributes are ignored. Returns `None` when the line has no
    /// `name=value` pair.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';').map(str::trim);
        let (name, value) = parts.next()?.split_once('=')?;
        if name.is_empty() {
            return None;
        }
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        let mut cookie = Cookie::new(name, value);

        for attribute in parts {
            let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
            match key.to_ascii_lowercase().as_str() {
                "path" => cookie.path = Some(val.to_string()),
                "domain" => cookie.domain = Some(val.to_string()),
                "max-age" => cookie.max_age = val.parse().ok(),
                "expires" => {
                    cookie.expires = DateTime::parse_from_rfc2822(&val.replace("GMT", "+0000"))
                        .ok()
                        .map(|d| d.with_timezone(&Utc))
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "samesite" => {
                    cookie.same_site = match val.to_ascii_lowercase().as_str() {
                        "strict" => Some(SameSite::Strict),
                        "lax" => Some(SameSite::Lax),
                        "none" => Some(SameSite::None),
                        _ => None,
                    }
                }
                _ => {}
            }
        }
        Some(cookie)
    }
}

/// Attribute defaults applied to outgoing cookies that leave them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDefaults {
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieDefaults {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            same_site: SameSite::Strict,
        }
    }
}

impl CookieDefaults {
    /// Defaults derived from the application base uri, e.g.
    /// `https://example.com/app/` gives path `/app/`, domain `example.com`
    /// and secure cookies.
    pub fn from_base_uri(base_uri: &str) -> Self {
        let (scheme, rest) = base_uri.split_once("://").unwrap_or(("", base_uri));
        let (authority, path) = match rest.find('/') {
            Some(index) if !scheme.is_empty() => (&rest[..index], &rest[index..]),
            None if !scheme.is_empty() => (rest, "/"),
            _ => ("", rest),
        };
        let host = authority.split(':').next().unwrap_or_default();
        let path = path.split('?').next().unwrap_or("/");

        Self {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            domain: if host == "localhost" { String::new() } else { host.to_string() },
            secure: scheme.eq_ignore_ascii_case("https"),
            same_site: SameSite::Strict,
        }
    }

    pub fn apply(&self, mut cookie: Cookie) -> Cookie {
        if cookie.path.is_none() {
            cookie.path = Some(self.path.clone());
        }
        if cookie.domain.is_none() && !self.domain.is_empty() {
            cookie.domain = Some(self.domain.clone());
        }
        cookie.secure = cookie.secure || self.secure;
        if cookie.same_site.is_none() {
            cookie.same_site = Some(self.same_site);
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_header() {
        let header = Cookie::new("sess", "a b")
            .with_path("/app/")
            .secure(true)
            .http_only(true)
            .with_same_site(SameSite::Lax)
            .to_header();
        assert_eq!(header, "sess=a%20b; Path=/app/; Secure; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn test_parse_header() {
        let header = "theme=dark%20blue; Path=/; Max-Age=60; HttpOnly; SameSite=strict";
        let cookie = Cookie::parse(header).unwrap();
        assert_eq!(cookie.name, "theme");
        assert_eq!(cookie.value, "dark blue");
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert_eq!(cookie.max_age, Some(60));
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site, Some(SameSite::Strict));
        assert!(Cookie::parse("no-pair").is_none());
    }

    #[test]
    fn test_expired_cookie() {
        let header = Cookie::expired("old").to_header();
        assert!(header.starts_with("old=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn test_defaults_from_base_uri() {
        let defaults = CookieDefaults::from_base_uri("https://example.com:8443/app/");
        assert_eq!(defaults.path, "/app/");
        assert_eq!(defaults.domain, "example.com");
        assert!(defaults.secure);

        let local = CookieDefaults::from_base_uri("http://localhost");
        assert_eq!(local.path, "/");
        assert_eq!(local.domain, "");
        assert!(!local.secure);
    }

    #[test]
    fn test_defaults_leave_explicit_attributes() {
        let defaults = CookieDefaults::from_base_uri("https://example.com/");
        let cookie = defaults.apply(
            Cookie::new("a", "1")
                .with_path("/admin")
                .with_same_site(SameSite::None),
        );
        assert_eq!(cookie.path.as_deref(), Some("/admin"));
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, Some(SameSite::None));
    }
}
