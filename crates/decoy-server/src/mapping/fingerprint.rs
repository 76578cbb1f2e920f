//! Rule fingerprinting.
//!
//! The identity of a rule is the first [`IDENTITY_LEN`] hex characters of the
//! SHA-256 digest of its canonical form. The canonical form only covers the
//! matching criteria (methods, path, path regex, body regex, headers, query
//! parameters) and is independent of set/map iteration order, so the same
//! logical rule always gets the same name. Priority and response are excluded.

use super::types::Rule;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of hex characters kept from the digest
pub const IDENTITY_LEN: usize = 8;

/// Compute the identity of a rule.
pub fn identity(rule: &Rule) -> String {
    let digest = Sha256::digest(canonical_form(rule).as_bytes());
    let mut name = hex::encode(digest);
    name.truncate(IDENTITY_LEN);
    name
}

/// Canonical, order-independent text encoding of a rule's matching criteria.
///
/// The criteria are encoded as one JSON array, so delimiter characters inside
/// values can never make two different rules encode the same way.
pub fn canonical_form(rule: &Rule) -> String {
    json!([
        rule.methods,
        rule.path,
        rule.path_regex,
        rule.text_body_regex,
        normalize_header_names(&rule.headers),
        sorted_values(&rule.query_params),
    ])
    .to_string()
}

/// Lowercase header names, merging the values of names that only differ in case,
/// and sort each value list.
pub fn normalize_header_names(
    headers: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, Vec<String>> {
    let mut normalized: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, values) in headers {
        normalized
            .entry(name.to_ascii_lowercase())
            .or_default()
            .extend(values.iter().cloned());
    }
    for values in normalized.values_mut() {
        values.sort();
    }
    normalized
}

/// Copy of a multimap with each value list sorted.
pub fn sorted_values(map: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    map.iter()
        .map(|(key, values)| {
            let mut values = values.clone();
            values.sort();
            (key.clone(), values)
        })
        .collect()
}
