//! keylookup-core: public key lookups whose failures travel as values
//!
//! A lookup flows through the crate as:
//!
//! ```text
//! search text -> SearchResolver -> KeyStore (paged) -> KeyMetadata
//!             -> FallibleSequence -> formatter -> response body
//! ```
//!
//! Every failure travels as data. Store and stream errors end a sequence
//! with `Err`; "nothing found" is a successful sequence with no items. The
//! one exception is a record that does not fit the key schema, which panics
//! and is turned into `Err` at the sequence boundary.
//!
//! Concrete store clients are injected through [`KeyStore`] and
//! [`ObjectStore`]; [`store::memory`] has in-process backends.

pub mod attribute;
pub mod config;
mod error;
pub mod format;
pub mod lookup;
pub mod result;
pub mod search;
pub mod sequence;
pub mod service;
pub mod store;

pub use attribute::{AttributeValue, KeyMetadata, RawAttributeRecord};
pub use config::ServiceConfig;
pub use error::Error;
pub use format::{ContentType, Formatted, IndexFormat};
pub use lookup::{Lookup, SearchingLookup};
pub use result::{AsyncResult, Cause, Result};
pub use search::{classify, Classified, PageLimit, SearchKind, SearchResolver};
pub use sequence::{drain, BoxSequence, FallibleSequence, Generator, Step, Yielder};
pub use service::KeyService;
pub use store::{ByteStream, KeyStore, MemoryKeyStore, MemoryObjectStore, ObjectStore};
