//! Store boundary: the keyed store of key metadata and the object store of
//! armored keys
//!
//! Both are consumed through traits so the resolver and the operations never
//! name a concrete client. [`memory`] provides in-process backends.

pub mod memory;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::attribute::{RawAttributeRecord, FIELD_FINGERPRINT_UPPER, FIELD_KEY_ID, FIELD_PRIMARY_USER_ID};
use crate::Result;

pub use memory::{MemoryKeyStore, MemoryObjectStore};

/// Boxed asynchronous byte stream of one stored object
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opaque cursor to the next page of a query or scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken(pub String);

/// Composite primary key of a stored key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocator {
    /// Partition key
    pub key_id: String,
    /// Sort key
    pub fingerprint_upper: String,
}

/// All records sharing one key id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionQuery {
    pub key_id: String,
    pub continuation: Option<ContinuationToken>,
    pub limit: Option<u32>,
}

/// All records matching a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredScan {
    pub filter: ScanFilter,
    pub continuation: Option<ContinuationToken>,
    pub limit: Option<u32>,
}

/// One page of query or scan results
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RawAttributeRecord>,
    /// Present when more records remain
    pub continuation: Option<ContinuationToken>,
}

/// Keyword filter for scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Primary user id equals the term
    PrimaryUserIdEquals(String),
    /// Any of primary user id, key id or fingerprint contains the term
    Contains(String),
}

impl ScanFilter {
    pub fn term(&self) -> &str {
        match self {
            ScanFilter::PrimaryUserIdEquals(term) | ScanFilter::Contains(term) => term,
        }
    }

    /// Filter expression with the term bound as `:search`
    pub fn expression(&self) -> String {
        match self {
            ScanFilter::PrimaryUserIdEquals(_) => format!("{} = :search", FIELD_PRIMARY_USER_ID),
            ScanFilter::Contains(_) => [FIELD_PRIMARY_USER_ID, FIELD_KEY_ID, FIELD_FINGERPRINT_UPPER]
                .iter()
                .map(|field| format!("contains({}, :search)", field))
                .collect::<Vec<_>>()
                .join(" OR "),
        }
    }

    /// Evaluate the filter against a record; comparison is case-sensitive
    pub fn matches(&self, record: &RawAttributeRecord) -> bool {
        let field = |name: &str| record.get(name).and_then(|v| v.as_str());
        match self {
            ScanFilter::PrimaryUserIdEquals(term) => field(FIELD_PRIMARY_USER_ID) == Some(term.as_str()),
            ScanFilter::Contains(term) => [FIELD_PRIMARY_USER_ID, FIELD_KEY_ID, FIELD_FINGERPRINT_UPPER]
                .iter()
                .any(|name| field(name).is_some_and(|value| value.contains(term.as_str()))),
        }
    }
}

/// Keyed store of key metadata records
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Point lookup by composite key; `None` when absent
    async fn get(&self, locator: &KeyLocator) -> Result<Option<RawAttributeRecord>>;

    /// One page of a partition query
    async fn query(&self, query: &PartitionQuery) -> Result<Page>;

    /// One page of a filtered scan
    async fn scan(&self, scan: &FilteredScan) -> Result<Page>;
}

/// Object store holding one armored key per object
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream the named object, or fail with [`crate::Error::NotFound`]
    async fn get_object(&self, name: &str) -> Result<ByteStream>;
}
