// Request cookie values

use portico_core::HttpRequest;
use std::collections::HashMap;

/// Cookies sent by the client, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieValues {
    values: HashMap<String, String>,
}

impl CookieValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header. Later duplicates win; malformed pairs are skipped.
    pub fn parse(header: &str) -> Self {
        let values = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = value.trim().trim_matches('"');
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                Some((name.to_string(), value))
            })
            .collect();
        Self { values }
    }

    /// Cookie values of `request`, as decoded by the cookies middleware when
    /// it ran, otherwise parsed from the raw header.
    pub fn from_request(request: &HttpRequest) -> Self {
        if let Some(values) = request.extensions.get::<CookieValues>() {
            return values.clone();
        }
        request.header("cookie").map(Self::parse).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render back into a `Cookie` header value, sorted by name.
    pub fn to_header(&self) -> String {
        let mut pairs: Vec<_> = self.values.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
