//! Mapping model and the matching engine.
//!
//! ## Module Structure
//!
//! - `types`: `Rule`, `Response`, `Mapping` and validation errors
//! - `fingerprint`: order-independent rule identity
//! - `request`: the inbound request as seen by rules
//! - `matcher`: compiled rules and per-criterion evaluation
//! - `resolver`: priority-based winner selection
//! - `cache`: the concurrent in-memory mapping table

mod cache;
mod fingerprint;
mod matcher;
mod request;
mod resolver;
mod types;


pub use cache::{CachedMapping, MappingCache, MappingTable};
pub use fingerprint::{canonical_form, identity, IDENTITY_LEN};
pub use matcher::{CompiledRule, MatchVerdict};
pub use request::{decode_path, parse_query_string, MockRequest};
pub use resolver::resolve;
pub use types::{
    Mapping, MappingError, MappingRequest, Response, ResponseBody, Rule, DEFAULT_STATUS_CODE,
    STATUS_CODE_RANGE,
};
