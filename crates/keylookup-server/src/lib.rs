//! keylookup-server: HKP-style key lookups over HTTP
//!
//! Serves `/pks/lookup` on top of [`keylookup_core::KeyService`], mapping
//! lookup failures onto HTTP status codes.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ServerError;
pub use routes::{create_router, LookupParams, Operation};
pub use server::{KeyServer, ServerBuilder};
pub use state::{ServerState, SharedState, StoreStats};
