// HTTP request and response types

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inbound HTTP request.
///
/// Header names are stored lower-cased. `path` always starts with `/` and
/// never carries the query string, which lives in `query`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub remote_addr: Option<String>,
    pub extensions: ::http::Extensions,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::from_uri(method, &path.into())
    }

    /// Build a request from an absolute (`https://host/path?q`) or relative
    /// (`blog/5?page=2`) uri.
    pub fn from_uri(method: impl Into<String>, uri: &str) -> Self {
        let uri = uri.split('#').next().unwrap_or_default();

        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), Some(rest)),
            None => ("http".to_string(), None),
        };

        let (authority, target) = match rest {
            Some(rest) => {
                let end = rest.find(['/', '?']).unwrap_or(rest.len());
                (&rest[..end], &rest[end..])
            }
            None => ("", uri),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host.to_ascii_lowercase(), Some(port)),
                Err(_) => (authority.to_ascii_lowercase(), None),
            },
            None => (authority.to_ascii_lowercase(), None),
        };

        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let path = format!("/{}", path.trim_start_matches('/'));

        Self {
            method: method.into().to_ascii_uppercase(),
            scheme,
            host,
            port,
            path,
            query: query.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            path_params: HashMap::new(),
            query_params: parse_query_string(query),
            attributes: HashMap::new(),
            remote_addr: None,
            extensions: ::http::Extensions::new(),
        }
    }

    /// Full request uri. Relative when the request carries no host.
    pub fn uri(&self) -> String {
        let mut uri = String::new();
        if !self.host.is_empty() {
            uri.push_str(&self.origin());
        }
        uri.push_str(&self.path);
        if !self.query.is_empty() {
            uri.push('?');
            uri.push_str(&self.query);
        }
        uri
    }

    /// `scheme://host[:port]`, falling back to `localhost` when no host is set.
    pub fn origin(&self) -> String {
        let host = if self.host.is_empty() { "localhost" } else { &self.host };
        match self.port {
            Some(port) if !is_default_port(&self.scheme, port) => {
                format!("{}://{}:{}", self.scheme, host, port)
            }
            _ => format!("{}://{}", self.scheme, host),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().to_ascii_lowercase();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        parse_query_string(&String::from_utf8_lossy(&self.body))
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

/// Parse a query string into key/value pairs.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Canonical reason phrase for a status code.
pub fn reason_phrase(status: u16) -> &'static str {
    ::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// HTTP response wrapper
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// `Set-Cookie` header lines, one per cookie.
    pub cookies: Vec<String>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            cookies: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn forbidden() -> Self {
        Self::new(403)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn redirect(location: impl Into<String>, status: u16) -> Self {
        Self::new(status).with_header("location", location)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_header("content-type", "text/plain; charset=utf-8")
            .with_body(text.into())
    }

    pub fn with_html(self, html: impl Into<String>) -> Self {
        self.with_header("content-type", "text/html; charset=utf-8")
            .with_body(html.into())
    }

    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self.with_header("content-type", "application/json").with_body(body))
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, set_cookie: impl Into<String>) -> Self {
        self.cookies.push(set_cookie.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_absolute_uri() {
        let req = HttpRequest::from_uri(
            "get",
            "https://Backend.Example.com:8443/private/foo?page=2&q=a+b",
        );
        assert_eq!(req.method, "GET");
        assert_eq!(req.scheme, "https");
        assert_eq!(req.host, "backend.example.com");
        assert_eq!(req.port, Some(8443));
        assert_eq!(req.path, "/private/foo");
        assert_eq!(req.query("page"), Some(&"2".to_string()));
        assert_eq!(req.query("q"), Some(&"a b".to_string()));
        assert_eq!(req.uri(), "https://backend.example.com:8443/private/foo?page=2&q=a+b");
    }

    #[test]
    fn test_from_relative_uri() {
        let req = HttpRequest::from_uri("POST", "blog/5");
        assert_eq!(req.host, "");
        assert_eq!(req.path, "/blog/5");
        assert_eq!(req.uri(), "/blog/5");
        assert_eq!(req.origin(), "http://localhost");
    }

    #[test]
    fn test_default_port_is_hidden() {
        let req = HttpRequest::from_uri("GET", "http://example.com:80/");
        assert_eq!(req.origin(), "http://example.com");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = HttpRequest::new("GET", "/").with_header("X-Requested-With", "XMLHttpRequest");
        assert_eq!(req.header("x-requested-with"), Some("XMLHttpRequest"));
        assert!(req.is_ajax());
    }

    #[test]
    fn test_form_body() {
        let req = HttpRequest::new("POST", "/").with_body("_method=PUT&name=J%C3%BCrg");
        let form = req.form();
        assert_eq!(form.get("_method").map(String::as_str), Some("PUT"));
        assert_eq!(form.get("name").map(String::as_str), Some("Jürg"));
    }

    #[test]
    fn test_response_builders() {
        let res = HttpResponse::ok().with_text("hello").with_cookie("a=b");
        assert_eq!(res.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body_string(), "hello");
        assert_eq!(res.cookies, vec!["a=b".to_string()]);

        let res = HttpResponse::not_found()
            .with_json(&serde_json::json!({"status": 404}))
            .unwrap();
        assert_eq!(res.content_type(), Some("application/json"));
        assert_eq!(res.body_string(), r#"{"status":404}"#);
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(419), "Unknown Status");
    }
}
