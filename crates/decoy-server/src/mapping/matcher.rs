//! Rule matching.
//!
//! A [`CompiledRule`] is built once per mapping, so regex compile errors
//! surface at registration and never during matching. Evaluation checks five
//! independent criteria, all of which must hold:
//!
//! - method: empty set, or the request method is a member
//! - path: regex match when `path_regex` is set, exact equality otherwise
//! - headers: for every required name, the request's values equal the required
//!   values as a multiset (order ignored, count matters)
//! - query: for every required name, every required value is present
//!   (extra values and parameters are allowed)
//! - body: empty pattern, or the pattern matches the body read as lossy UTF-8

use super::fingerprint::{normalize_header_names, sorted_values};
use super::request::MockRequest;
use super::types::{MappingError, Rule};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone)]
enum PathMatcher {
    Exact(String),
    Regex(Regex),
}

/// Matching criteria of a rule, ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    methods: BTreeSet<String>,
    path: PathMatcher,
    /// Lowercased names, sorted values
    headers: Vec<(String, Vec<String>)>,
    query_params: Vec<(String, Vec<String>)>,
    body: Option<Regex>,
}

/// Per-criterion outcome of evaluating a rule against a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchVerdict {
    pub method: bool,
    pub path: bool,
    pub headers: bool,
    pub query: bool,
    pub body: bool,
}

impl MatchVerdict {
    pub fn passed(&self) -> bool {
        self.method && self.path && self.headers && self.query && self.body
    }
}

impl CompiledRule {
    pub fn compile(rule: &Rule) -> Result<Self, MappingError> {
        let path = if rule.path_regex.is_empty() {
            PathMatcher::Exact(rule.path.clone())
        } else {
            let regex = Regex::new(&rule.path_regex).map_err(|source| {
                MappingError::InvalidRegex {
                    field: "path_regex",
                    source,
                }
            })?;
            PathMatcher::Regex(regex)
        };

        let body = if rule.text_body_regex.is_empty() {
            None
        } else {
            let regex = Regex::new(&rule.text_body_regex).map_err(|source| {
                MappingError::InvalidRegex {
                    field: "text_body_regex",
                    source,
                }
            })?;
            Some(regex)
        };

        Ok(Self {
            methods: rule.methods.clone(),
            path,
            headers: normalize_header_names(&rule.headers).into_iter().collect(),
            query_params: sorted_values(&rule.query_params).into_iter().collect(),
            body,
        })
    }

    pub fn matches(&self, request: &MockRequest) -> bool {
        self.evaluate(request).passed()
    }

    /// Evaluate every criterion, without short-circuiting, so the full verdict
    /// is available for diagnostics.
    pub fn evaluate(&self, request: &MockRequest) -> MatchVerdict {
        let verdict = MatchVerdict {
            method: self.method_matches(&request.method),
            path: self.path_matches(&request.path),
            headers: self.headers_match(request),
            query: self.query_matches(request),
            body: self.body_matches(&request.body),
        };
        debug!(
            method = verdict.method,
            path = verdict.path,
            headers = verdict.headers,
            query = verdict.query,
            body = verdict.body,
            "rule evaluated"
        );
        verdict
    }

    fn method_matches(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    fn path_matches(&self, path: &str) -> bool {
        match &self.path {
            PathMatcher::Exact(expected) => expected == path,
            PathMatcher::Regex(regex) => regex.is_match(path),
        }
    }

    fn headers_match(&self, request: &MockRequest) -> bool {
        self.headers.iter().all(|(name, required)| {
            let mut actual: Vec<&str> = request
                .header_values(name)
                .iter()
                .map(String::as_str)
                .collect();
            actual.sort_unstable();
            actual.len() == required.len()
                && actual.iter().zip(required).all(|(have, need)| *have == need)
        })
    }

    fn query_matches(&self, request: &MockRequest) -> bool {
        self.query_params.iter().all(|(name, required)| {
            let actual = request.query_values(name);
            required.iter().all(|value| actual.contains(value))
        })
    }

    fn body_matches(&self, body: &[u8]) -> bool {
        self.body
            .as_ref()
            .map_or(true, |regex| regex.is_match(&String::from_utf8_lossy(body)))
    }
}
