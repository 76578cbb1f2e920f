//! Concrete inbound request as seen by the matcher.

use bytes::Bytes;
use hyper::HeaderMap;
use std::collections::HashMap;

/// An inbound request reduced to the fields rules can match on.
///
/// Header names are stored lowercased; every header and query parameter keeps
/// all of its values in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, Vec<String>>,
    pub query_params: HashMap<String, Vec<String>>,
    pub body: Bytes,
}

impl MockRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Build from hyper request parts. The path is percent-decoded (`+` stays
    /// as is). Header values and decoded path bytes that are not valid UTF-8
    /// are decoded lossily.
    pub fn from_parts(
        method: &hyper::Method,
        uri: &hyper::Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Self {
        let mut request = Self::new(method.as_str(), decode_path(uri.path()));
        for (name, value) in headers {
            request
                .headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        request.query_params = parse_query_string(uri.query());
        request.body = body;
        request
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        for (key, values) in parse_query_string(Some(query)) {
            self.query_params.entry(key).or_default().extend(values);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// All values of a header, looked up case-insensitively
    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn query_values(&self, name: &str) -> &[String] {
        self.query_params
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Parse a query string into a multimap, URL-decoding keys and values.
/// `+` is treated as a space.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    let Some(query) = query else {
        return params;
    };
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    params
}

/// Percent-decode a request path
pub fn decode_path(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderName, HeaderValue};

    #[test]
    fn test_parse_query_string_multi_values() {
        let params = parse_query_string(Some("a=1&a=2&b=x%20y&c&d=p+q"));
        assert_eq!(params["a"], vec!["1", "2"]);
        assert_eq!(params["b"], vec!["x y"]);
        assert_eq!(params["c"], vec![""]);
        assert_eq!(params["d"], vec!["p q"]);
        assert!(parse_query_string(None).is_empty());
    }

    #[test]
    fn test_from_parts_collects_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append(
            HeaderName::from_static("x-tag"),
            HeaderValue::from_static("one"),
        );
        headers.append(
            HeaderName::from_static("x-tag"),
            HeaderValue::from_static("two"),
        );
        let uri: hyper::Uri = "/items?id=7".parse().unwrap();
        let request =
            MockRequest::from_parts(&hyper::Method::POST, &uri, &headers, Bytes::from("x"));

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/items");
        assert_eq!(request.header_values("X-Tag"), ["one", "two"]);
        assert_eq!(request.query_values("id"), ["7"]);
        assert_eq!(request.body, Bytes::from("x"));
    }

    #[test]
    fn test_builder_lowercases_header_names() {
        let request = MockRequest::new("GET", "/").with_header("X-Token", "abc");
        assert_eq!(request.header_values("x-token"), ["abc"]);
        assert!(request.header_values("missing").is_empty());
    }

    #[test]
    fn test_from_parts_decodes_path() {
        let uri: hyper::Uri = "/files/my%20doc?x=1".parse().unwrap();
        let request =
            MockRequest::from_parts(&hyper::Method::GET, &uri, &HeaderMap::new(), Bytes::new());
        assert_eq!(request.path, "/files/my doc");

        assert_eq!(decode_path("/caf%C3%A9"), "/café");
        assert_eq!(decode_path("/a+b"), "/a+b");
        assert_eq!(decode_path("/bad%ff"), "/bad\u{fffd}");
        assert_eq!(decode_path("/100%"), "/100%");
    }
}
