//! Cookie processing between the wire and the application.
//!
//! Incoming cookie values are decrypted and outgoing ones encrypted when a
//! [`CookieEncrypter`] is configured. Whitelisted cookie names are never
//! touched, so cookies that other layers read raw (the session id) keep
//! working.

use super::cookie::{Cookie, CookieDefaults};
use super::values::CookieValues;
use crate::error::SessionResult;
use parking_lot::RwLock;
use portico_core::{HttpRequest, HttpResponse};
use portico_log::{trace, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Pluggable cookie value cipher.
pub trait CookieEncrypter: Send + Sync {
    fn encrypt(&self, name: &str, value: &str) -> SessionResult<String>;

    fn decrypt(&self, name: &str, value: &str) -> SessionResult<String>;
}

#[derive(Default)]
pub struct CookiesProcessor {
    whitelist: RwLock<HashSet<String>>,
    encrypter: Option<Arc<dyn CookieEncrypter>>,
    defaults: CookieDefaults,
}

impl CookiesProcessor {
    pub fn new(defaults: CookieDefaults) -> Self {
        Self {
            whitelist: RwLock::new(HashSet::new()),
            encrypter: None,
            defaults,
        }
    }

    pub fn with_encrypter(mut self, encrypter: Arc<dyn CookieEncrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn defaults(&self) -> &CookieDefaults {
        &self.defaults
    }

    /// Exclude `name` from encryption.
    pub fn whitelist(&self, name: impl Into<String>) -> &Self {
        self.whitelist.write().insert(name.into());
        self
    }

    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist.read().contains(name)
    }

    /// Cookie values of `request`, decrypted. Values that fail to decrypt
    /// are dropped.
    pub fn decode(&self, request: &HttpRequest) -> CookieValues {
        let raw = request.header("cookie").map(CookieValues::parse).unwrap_or_default();
        let Some(encrypter) = &self.encrypter else {
            return raw;
        };

        let mut decoded = CookieValues::new();
        for (name, value) in raw.iter() {
            if self.is_whitelisted(name) {
                decoded.set(name.clone(), value.clone());
                continue;
            }
            match encrypter.decrypt(name, value) {
                Ok(plain) => decoded.set(name.clone(), plain),
                Err(e) => warn!(target: "portico::cookies", "dropping cookie '{}': {}", name, e),
            }
        }
        decoded
    }

    /// Apply defaults to `cookie` and encrypt its value unless whitelisted.
    pub fn encode(&self, cookie: Cookie) -> SessionResult<Cookie> {
        let mut cookie = self.defaults.apply(cookie);
        if let Some(encrypter) = &self.encrypter
            && !self.is_whitelisted(&cookie.name)
            && !cookie.value.is_empty()
        {
            cookie.value = encrypter.encrypt(&cookie.name, &cookie.value)?;
        }
        Ok(cookie)
    }

    /// Encode the `Set-Cookie` lines of `response` and append `queued`.
    pub fn encode_response(
        &self,
        mut response: HttpResponse,
        queued: Vec<Cookie>,
    ) -> SessionResult<HttpResponse> {
        let mut lines = Vec::with_capacity(response.cookies.len() + queued.len());

        for line in std::mem::take(&mut response.cookies) {
            match Cookie::parse(&line) {
                Some(cookie) => lines.push(self.encode(cookie)?.to_header()),
                None => lines.push(line),
            }
        }
        for cookie in queued {
            trace!(target: "portico::cookies", "writing queued cookie {}", cookie.name);
            lines.push(self.encode(cookie)?.to_header());
        }

        response.cookies = lines;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    struct Reverse;

    impl CookieEncrypter for Reverse {
        fn encrypt(&self, _name: &str, value: &str) -> SessionResult<String> {
            Ok(format!("enc:{}", value.chars().rev().collect::<String>()))
        }

        fn decrypt(&self, _name: &str, value: &str) -> SessionResult<String> {
            value
                .strip_prefix("enc:")
                .map(|v| v.chars().rev().collect())
                .ok_or_else(|| SessionError::Cookie("not encrypted".into()))
        }
    }

    fn processor() -> CookiesProcessor {
        let processor =
            CookiesProcessor::new(CookieDefaults::default()).with_encrypter(Arc::new(Reverse));
        processor.whitelist("sess");
        processor
    }

    #[test]
    fn test_decode_skips_whitelisted_and_drops_invalid() {
        let request = HttpRequest::new("GET", "/")
            .with_header("cookie", "sess=abc; theme=enc:krad; bad=plain");
        let values = processor().decode(&request);
        assert_eq!(values.get("sess"), Some("abc"));
        assert_eq!(values.get("theme"), Some("dark"));
        assert!(!values.has("bad"));
    }

    #[test]
    fn test_encode_response() {
        let response = HttpResponse::ok()
            .with_cookie(Cookie::new("sess", "abc").to_header())
            .with_cookie(Cookie::new("theme", "dark").to_header());
        let encoded = processor()
            .encode_response(response, vec![Cookie::new("flash", "hi")])
            .unwrap();

        assert_eq!(encoded.cookies.len(), 3);
        assert!(encoded.cookies[0].starts_with("sess=abc;"));
        assert!(encoded.cookies[1].starts_with("theme=enc%3Akrad;"));
        assert!(encoded.cookies[2].starts_with("flash=enc%3Aih;"));
        assert!(
            encoded
                .cookies
                .iter()
                .all(|c| c.contains("Path=/") && c.contains("SameSite=Strict"))
        );
    }

    #[test]
    fn test_without_encrypter_values_pass_through() {
        let processor = CookiesProcessor::new(CookieDefaults::default());
        let request = HttpRequest::new("GET", "/").with_header("cookie", "theme=dark");
        assert_eq!(processor.decode(&request).get("theme"), Some("dark"));
        assert_eq!(processor.encode(Cookie::new("theme", "dark")).unwrap().value, "dark");
    }
}
