// Library exports for the decoy binary, integration tests and benchmarks

pub mod config;
pub mod mapping;
pub mod metrics;
pub mod reconcile;
pub mod record;
pub mod server;
pub mod service;
pub mod store;

pub use mapping::{Mapping, MappingError, MappingRequest, MockRequest, Response, Rule};
pub use reconcile::{Reconciler, SyncReport};
pub use service::MockService;
