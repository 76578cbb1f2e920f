//! Type definitions for mappings.
//!
//! A `Mapping` pairs a matching `Rule` with a canned `Response`. Its name is the
//! fingerprint of the rule and is derived once, at construction.

use super::fingerprint::identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Status code used when a registration leaves `status_code` unset.
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Status codes a response may carry
pub const STATUS_CODE_RANGE: std::ops::RangeInclusive<u16> = 100..=999;

// ============================================================================
// Rule
// ============================================================================

/// Matching criteria of a mapping.
///
/// Every criterion is optional; an empty criterion matches anything. `path` and
/// `path_regex` are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Higher priority wins when several rules match the same request
    pub priority: i64,
    /// Accepted HTTP methods; empty accepts any method
    #[serde(deserialize_with = "null_as_default")]
    pub methods: BTreeSet<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path_regex: String,
    #[serde(deserialize_with = "null_as_default")]
    pub text_body_regex: String,
    /// Header name -> exact multiset of values the request must carry
    #[serde(deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Parameter name -> values the request must carry (extra values allowed)
    #[serde(deserialize_with = "null_as_default")]
    pub query_params: BTreeMap<String, Vec<String>>,
}

impl Rule {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_path_regex(pattern: impl Into<String>) -> Self {
        Self {
            path_regex: pattern.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// Canned reply returned for a matching request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub content_type: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub text_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_body: Option<serde_json::Value>,
    /// Raw body, base64 encoded on the wire
    #[serde(skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub bytes_body: Option<Vec<u8>>,
    pub status_code: u16,
    #[serde(
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub headers: BTreeMap<String, Vec<String>>,
}

/// Borrowed view of the populated body variant of a `Response`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseBody<'a> {
    Empty,
    Text(&'a str),
    Json(&'a serde_json::Value),
    Bytes(&'a [u8]),
}

impl Response {
    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            text_body: body.into(),
            ..Default::default()
        }
    }

    /// Number of populated body fields (valid responses have at most one)
    pub fn body_count(&self) -> usize {
        [
            !self.text_body.is_empty(),
            self.json_body.is_some(),
            self.bytes_body.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    pub fn body(&self) -> ResponseBody<'_> {
        if !self.text_body.is_empty() {
            ResponseBody::Text(&self.text_body)
        } else if let Some(json) = &self.json_body {
            ResponseBody::Json(json)
        } else if let Some(bytes) = &self.bytes_body {
            ResponseBody::Bytes(bytes)
        } else {
            ResponseBody::Empty
        }
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// A registered rule/response pair.
///
/// The name is the fingerprint of the rule. It is computed in the constructor
/// and never read back from serialized input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MappingDocument")]
pub struct Mapping {
    name: String,
    update_time: DateTime<Utc>,
    rule: Rule,
    response: Response,
}

impl Mapping {
    pub fn new(rule: Rule, response: Response, update_time: DateTime<Utc>) -> Self {
        Self {
            name: identity(&rule),
            update_time,
            rule,
            response,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_time(&self) -> DateTime<Utc> {
        self.update_time
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn priority(&self) -> i64 {
        self.rule.priority
    }

    /// Check the structural invariants that do not need regex compilation.
    pub fn validate(&self) -> Result<(), MappingError> {
        if !self.rule.path.is_empty() && !self.rule.path_regex.is_empty() {
            return Err(MappingError::ConflictingPath);
        }
        if self.response.body_count() > 1 {
            return Err(MappingError::MultipleBodies);
        }
        if !STATUS_CODE_RANGE.contains(&self.response.status_code) {
            return Err(MappingError::InvalidStatus(self.response.status_code));
        }
        Ok(())
    }
}

/// Serialized form of a mapping, as stored and as accepted from clients.
/// A `name` present in the input is ignored.
#[derive(Debug, Deserialize)]
struct MappingDocument {
    update_time: DateTime<Utc>,
    #[serde(default)]
    rule: Rule,
    #[serde(default)]
    response: Response,
}

impl From<MappingDocument> for Mapping {
    fn from(doc: MappingDocument) -> Self {
        Mapping::new(doc.rule, doc.response, doc.update_time)
    }
}

/// Registration payload: a rule and its response.
///
/// Fields such as `name` or `update_time` that clients may echo back from a
/// previous listing are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingRequest {
    #[serde(default)]
    pub rule: Rule,
    #[serde(default)]
    pub response: Response,
}

impl MappingRequest {
    pub fn new(rule: Rule, response: Response) -> Self {
        Self { rule, response }
    }

    /// Build the mapping stamped with `now`, defaulting an unset status code.
    pub fn into_mapping(self, now: DateTime<Utc>) -> Mapping {
        let mut response = self.response;
        if response.status_code == 0 {
            response.status_code = DEFAULT_STATUS_CODE;
        }
        Mapping::new(self.rule, response, now)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a mapping is rejected at registration.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("cannot have both path and path_regex")]
    ConflictingPath,
    #[error("could not compile {field}: {source}")]
    InvalidRegex {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("only one of text_body, json_body and bytes_body may be set")]
    MultipleBodies,
    #[error("invalid status code {0}: must be between 100 and 999")]
    InvalidStatus(u16),
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_str(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
