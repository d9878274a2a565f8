//! Read-side helpers over the current request.

use portico_core::HttpRequest;
use std::cmp::Ordering;

/// One media range of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptItem {
    mime: String,
    quality: f32,
}

impl AcceptItem {
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }
}

/// Parse an `Accept` header, best match first. Equal qualities keep the
/// order of the header.
pub fn parse_accept(header: &str) -> Vec<AcceptItem> {
    let mut items: Vec<AcceptItem> = header
        .split(',')
        .filter_map(|part| {
            let mut params = part.split(';').map(str::trim);
            let mime = params.next().filter(|m| !m.is_empty())?.to_ascii_lowercase();
            let quality = params
                .find_map(|p| p.strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(AcceptItem { mime, quality })
        })
        .collect();
    items.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal));
    items
}

/// Questions about what the client sent and what it wants back.
#[derive(Debug, Clone)]
pub struct Requester {
    request: HttpRequest,
}

impl Requester {
    pub fn new(request: HttpRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn accept_header(&self) -> Vec<AcceptItem> {
        parse_accept(self.request.header("accept").unwrap_or_default())
    }

    /// Whether the best ranked `Accept` entry is a JSON type.
    pub fn wants_json(&self) -> bool {
        self.accept_header()
            .first()
            .is_some_and(|item| item.mime == "application/json" || item.mime.ends_with("+json"))
    }

    /// Whether the request body is JSON.
    pub fn is_json(&self) -> bool {
        self.request
            .header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }

    pub fn is_ajax(&self) -> bool {
        self.request.is_ajax()
    }

    /// `GET` or `HEAD`.
    pub fn is_reading(&self) -> bool {
        matches!(self.request.method.as_str(), "GET" | "HEAD")
    }

    /// Body fields: JSON objects for JSON requests, form fields otherwise.
    pub fn input(&self) -> serde_json::Map<String, serde_json::Value> {
        if self.is_json() {
            return self
                .request
                .json::<serde_json::Map<String, serde_json::Value>>()
                .unwrap_or_default();
        }
        self.request
            .form()
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accept_orders_by_quality() {
        let items = parse_accept("text/html;q=0.8, application/xml;q=0.9, application/json");
        let mimes: Vec<&str> = items.iter().map(AcceptItem::mime).collect();
        assert_eq!(mimes, vec!["application/json", "application/xml", "text/html"]);
        assert!(parse_accept("").is_empty());
    }

    fn accepting(accept: &str) -> Requester {
        Requester::new(HttpRequest::new("GET", "/").with_header("accept", accept))
    }

    #[test]
    fn test_wants_json() {
        assert!(accepting("application/json").wants_json());
        assert!(accepting("application/problem+json").wants_json());
        assert!(!accepting("text/html, application/json").wants_json());
        assert!(accepting("text/html;q=0.5, application/json").wants_json());
        assert!(!accepting("application/json;q=0.1, */*").wants_json());
        assert!(!Requester::new(HttpRequest::new("GET", "/")).wants_json());
    }

    #[test]
    fn test_input() {
        let form = Requester::new(HttpRequest::new("POST", "/").with_body("name=ada&lang=rust"));
        assert_eq!(form.input()["name"], "ada");
        assert!(!form.is_reading());

        let json = Requester::new(
            HttpRequest::new("POST", "/")
                .with_header("content-type", "application/json")
                .with_body(r#"{"id": 5}"#),
        );
        assert!(json.is_json());
        assert_eq!(json.input()["id"], 5);
    }
}
