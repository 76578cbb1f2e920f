//! Record a live upstream call as a mapping-ready response.
//!
//! The caller describes a request with [`SimpleRequest`]; [`Recorder`]
//! performs it and returns the request together with a [`Response`] that can
//! be registered as-is.

mod charset;

pub use charset::{charset_of, decode_body, media_type, DecodedBody};

use crate::mapping::Response;
use anyhow::Context;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Connection-level headers left out of recorded responses
const FRAMING_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "transfer-encoding",
];

/// Description of the request to record.
///
/// `scheme` holds the scheme and authority (`https://api.example.com`), `path`
/// the rest of the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheme: String,
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text_body: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
}

/// A performed request and the response it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub request: SimpleRequest,
    pub response: Response,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("could not parse body: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("could not parse url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid request data: {0}")]
    InvalidRequest(String),
    #[error("error calling service: {0}")]
    Upstream(#[source] reqwest::Error),
    #[error("could not read response: {0}")]
    ReadResponse(#[source] reqwest::Error),
}

impl RecordError {
    /// HTTP status reported to the client for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RecordError::InvalidBody(_)
            | RecordError::InvalidUrl { .. }
            | RecordError::InvalidRequest(_) => 400,
            RecordError::Upstream(_) => 503,
            RecordError::ReadResponse(_) => 500,
        }
    }
}

/// Performs recordings with a shared HTTP client.
#[derive(Debug, Clone)]
pub struct Recorder {
    client: reqwest::Client,
}

impl Recorder {
    pub fn new(timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for recording")?;
        Ok(Self { client })
    }

    /// Parse a JSON `SimpleRequest` and record it.
    pub async fn record_payload(&self, payload: &[u8]) -> Result<Recording, RecordError> {
        let request: SimpleRequest = serde_json::from_slice(payload)?;
        self.record(request).await
    }

    pub async fn record(&self, request: SimpleRequest) -> Result<Recording, RecordError> {
        let method = if request.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(request.method.as_bytes())
                .map_err(|_| RecordError::InvalidRequest(format!("method {}", request.method)))?
        };

        let raw_url = format!("{}{}", request.scheme, request.path);
        let mut url = Url::parse(&raw_url).map_err(|e| RecordError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;
        if !request.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, values) in &request.query_params {
                for value in values {
                    pairs.append_pair(key, value);
                }
            }
        }

        let mut outbound = self.client.request(method.clone(), url.clone());
        for (name, values) in &request.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RecordError::InvalidRequest(format!("header name {name}")))?;
            for value in values {
                let value = HeaderValue::from_str(value).map_err(|_| {
                    RecordError::InvalidRequest(format!("value of header {name}"))
                })?;
                outbound = outbound.header(header.clone(), value);
            }
        }
        if !request.text_body.is_empty() {
            outbound = outbound.body(request.text_body.clone());
        }

        debug!("Recording {} {}", method, url);
        let upstream = outbound.send().await.map_err(RecordError::Upstream)?;

        let status_code = upstream.status().as_u16();
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in upstream.headers() {
            if FRAMING_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let body = upstream.bytes().await.map_err(RecordError::ReadResponse)?;

        let mut response = Response {
            content_type,
            status_code,
            headers,
            ..Default::default()
        };
        match decode_body(&response.content_type, &body) {
            DecodedBody::Text(text) => response.text_body = text,
            DecodedBody::Bytes(bytes) => response.bytes_body = Some(bytes),
        }

        info!("Recorded {} {} -> {}", method, url, status_code);

        Ok(Recording {
            request: SimpleRequest {
                scheme: String::new(),
                method: method.to_string(),
                path: url.path().to_string(),
                ..request
            },
            response,
        })
    }
}
