//! In-process store backends

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use super::{ByteStream, ContinuationToken, FilteredScan, KeyLocator, KeyStore, ObjectStore, Page, PartitionQuery};
use crate::attribute::{RawAttributeRecord, FIELD_FINGERPRINT_UPPER, FIELD_KEY_ID};
use crate::{Error, Result};

/// Default chunk size for object streams
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Keyed store over a fixed list of records
///
/// Continuation tokens are offsets into the matching records, so paging
/// through the same query is stable.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    records: Vec<RawAttributeRecord>,
}

impl MemoryKeyStore {
    pub fn new(records: Vec<RawAttributeRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON array in the store's tagged wire form
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let records = serde_json::from_str(&content)?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn field<'a>(record: &'a RawAttributeRecord, name: &str) -> Option<&'a str> {
        record.get(name).and_then(|v| v.as_str())
    }
}

fn paginate(
    matching: Vec<&RawAttributeRecord>,
    continuation: Option<&ContinuationToken>,
    limit: Option<u32>,
) -> Result<Page> {
    let total = matching.len();
    let start = match continuation {
        Some(token) => token
            .0
            .parse::<usize>()
            .map_err(|_| Error::Store(format!("invalid continuation token: {}", token.0)))?
            .min(total),
        None => 0,
    };
    let end = match limit {
        Some(limit) if limit > 0 => start.saturating_add(limit as usize).min(total),
        _ => total,
    };

    Ok(Page {
        records: matching[start..end].iter().map(|r| (*r).clone()).collect(),
        continuation: (end < total).then(|| ContinuationToken(end.to_string())),
    })
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, locator: &KeyLocator) -> Result<Option<RawAttributeRecord>> {
        Ok(self
            .records
            .iter()
            .find(|r| {
                Self::field(r, FIELD_KEY_ID) == Some(locator.key_id.as_str())
                    && Self::field(r, FIELD_FINGERPRINT_UPPER) == Some(locator.fingerprint_upper.as_str())
            })
            .cloned())
    }

    async fn query(&self, query: &PartitionQuery) -> Result<Page> {
        let matching = self
            .records
            .iter()
            .filter(|r| Self::field(r, FIELD_KEY_ID) == Some(query.key_id.as_str()))
            .collect();
        paginate(matching, query.continuation.as_ref(), query.limit)
    }

    async fn scan(&self, scan: &FilteredScan) -> Result<Page> {
        let matching = self.records.iter().filter(|r| scan.filter.matches(r)).collect();
        paginate(matching, scan.continuation.as_ref(), scan.limit)
    }
}

/// Object store over in-memory blobs
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    objects: HashMap<String, Bytes>,
    chunk_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.objects.insert(name.into(), body.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Load every regular file in `dir`, named by its file name
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut store = Self::default();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let body = std::fs::read(entry.path())?;
            store.objects.insert(name, Bytes::from(body));
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, name: &str) -> Result<ByteStream> {
        let body = self
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object {}", name)))?;

        let chunks: Vec<Result<Bytes>> = (0..body.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(body.slice(start..(start + self.chunk_size).min(body.len()))))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeValue, FIELD_PRIMARY_USER_ID};
    use crate::store::ScanFilter;

    fn record(key_id: &str, upper: &str, user: &str) -> RawAttributeRecord {
        HashMap::from([
            (FIELD_KEY_ID.to_string(), AttributeValue::s(key_id)),
            (FIELD_FINGERPRINT_UPPER.to_string(), AttributeValue::s(upper)),
            (FIELD_PRIMARY_USER_ID.to_string(), AttributeValue::s(user)),
        ])
    }

    fn store() -> MemoryKeyStore {
        MemoryKeyStore::new(vec![
            record("AAAAAAAAAAAAAAAA", "111111111111111111111111", "alice"),
            record("AAAAAAAAAAAAAAAA", "222222222222222222222222", "alice twin"),
            record("BBBBBBBBBBBBBBBB", "333333333333333333333333", "bob"),
        ])
    }

    #[tokio::test]
    async fn test_point_lookup() {
        let store = store();
        let hit = store
            .get(&KeyLocator {
                key_id: "AAAAAAAAAAAAAAAA".into(),
                fingerprint_upper: "222222222222222222222222".into(),
            })
            .await
            .unwrap();
        assert_eq!(hit.unwrap()[FIELD_PRIMARY_USER_ID], AttributeValue::s("alice twin"));

        let miss = store
            .get(&KeyLocator {
                key_id: "AAAAAAAAAAAAAAAA".into(),
                fingerprint_upper: "999999999999999999999999".into(),
            })
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_query_pages_with_limit() {
        let store = store();
        let mut query = PartitionQuery {
            key_id: "AAAAAAAAAAAAAAAA".into(),
            continuation: None,
            limit: Some(1),
        };

        let first = store.query(&query).await.unwrap();
        assert_eq!(first.records.len(), 1);
        assert_eq!(first.continuation, Some(ContinuationToken("1".into())));

        query.continuation = first.continuation;
        let second = store.query(&query).await.unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(second.continuation.is_none());
    }

    #[tokio::test]
    async fn test_scan_unbounded() {
        let page = store()
            .scan(&FilteredScan {
                filter: ScanFilter::Contains("alice".into()),
                continuation: None,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(page.continuation.is_none());
    }

    #[tokio::test]
    async fn test_bad_token_is_store_error() {
        let result = store()
            .scan(&FilteredScan {
                filter: ScanFilter::Contains("alice".into()),
                continuation: Some(ContinuationToken("nope".into())),
                limit: None,
            })
            .await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_objects_stream_in_chunks() {
        let objects = MemoryObjectStore::new()
            .with_chunk_size(4)
            .with_object("k.asc", "0123456789");

        let chunks: Vec<Bytes> = objects
            .get_object("k.asc")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![Bytes::from("0123"), Bytes::from("4567"), Bytes::from("89")]);

        assert!(matches!(objects.get_object("missing").await, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.asc"), "armored").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let objects = MemoryObjectStore::load_dir(dir.path()).unwrap();
        assert_eq!(objects.len(), 1);

        let records_path = dir.path().join("records.json");
        std::fs::write(
            &records_path,
            r#"[{"pgpKeyId": {"S": "AAAAAAAAAAAAAAAA"}, "pgpFingerprintUpper": {"S": "1111"}, "primaryUserId": {"S": "a"}}]"#,
        )
        .unwrap();
        assert_eq!(MemoryKeyStore::load(&records_path).unwrap().len(), 1);
    }
}
