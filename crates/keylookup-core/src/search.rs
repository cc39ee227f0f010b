//! Search resolution: classify the search text, then walk the keyed store
//!
//! | Normalized search          | Store call                              |
//! |----------------------------|-----------------------------------------|
//! | 32, 40 or 64 hex digits    | one point lookup (key id, fingerprint)  |
//! | 16 hex digits              | partition query on the key id, paged    |
//! | anything else              | filtered scan on the raw text, paged    |
//!
//! Hex searches may carry a `0x` marker, which is stripped before the length
//! is taken.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::attribute::KeyMetadata;
use crate::lookup::SearchingLookup;
use crate::sequence::{Generator, Yielder};
use crate::store::{ContinuationToken, FilteredScan, KeyLocator, KeyStore, Page, PartitionQuery, ScanFilter};
use crate::Result;

/// Length of a key id in hex digits
pub const KEY_ID_LEN: usize = 16;

/// Fingerprint lengths in hex digits, by key version
pub const FINGERPRINT_LENS: [usize; 3] = [32, 40, 64];

const HEX_MARKER: &str = "0x";

/// Query shape chosen for a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKind {
    /// Full fingerprint, split into its leading part and trailing key id
    Fingerprint { fingerprint_upper: String, key_id: String },
    /// Bare key id, uppercased
    KeyId(String),
    /// Free text
    Keyword,
}

/// Classification of a raw search string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: SearchKind,
    /// Hex payload without its marker, or the raw text when not hex
    pub normalized: String,
}

/// Hex payload of `raw`, if it is an optionally marked hex string
fn hex_payload(raw: &str) -> Option<&str> {
    let is_hex = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit());

    match raw.get(..HEX_MARKER.len()) {
        Some(marker) if marker.eq_ignore_ascii_case(HEX_MARKER) && is_hex(&raw[HEX_MARKER.len()..]) => {
            Some(&raw[HEX_MARKER.len()..])
        }
        _ if is_hex(raw) => Some(raw),
        _ => None,
    }
}

/// Decide which query shape serves `raw`
pub fn classify(raw: &str) -> Classified {
    let Some(hex) = hex_payload(raw) else {
        return Classified {
            kind: SearchKind::Keyword,
            normalized: raw.to_string(),
        };
    };

    let kind = if FINGERPRINT_LENS.contains(&hex.len()) {
        let (fingerprint_upper, key_id) = hex.split_at(hex.len() - KEY_ID_LEN);
        SearchKind::Fingerprint {
            fingerprint_upper: fingerprint_upper.to_string(),
            key_id: key_id.to_string(),
        }
    } else if hex.len() == KEY_ID_LEN {
        SearchKind::KeyId(hex.to_ascii_uppercase())
    } else {
        SearchKind::Keyword
    };

    Classified {
        kind,
        normalized: hex.to_string(),
    }
}

/// Page size bound for queries and scans; `None` is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLimit(Option<u32>);

impl PageLimit {
    pub const UNBOUNDED: PageLimit = PageLimit(None);

    pub fn get(&self) -> Option<u32> {
        self.0
    }
}

impl From<Option<u32>> for PageLimit {
    /// Zero reads as unbounded
    fn from(limit: Option<u32>) -> Self {
        PageLimit(limit.filter(|l| *l > 0))
    }
}

/// Resolves searches into sequences of [`KeyMetadata`]
#[derive(Clone)]
pub struct SearchResolver {
    store: Arc<dyn KeyStore>,
    page_limit: PageLimit,
}

impl SearchResolver {
    pub fn new(store: Arc<dyn KeyStore>, page_limit: PageLimit) -> Self {
        Self { store, page_limit }
    }

    pub fn page_limit(&self) -> PageLimit {
        self.page_limit
    }

    /// Lazily resolve `lookup`; nothing touches the store until the first pull
    ///
    /// A search matching nothing terminates `Ok` with no items.
    pub fn resolve(&self, lookup: &SearchingLookup) -> Generator<KeyMetadata> {
        let classified = classify(&lookup.search);
        debug!(
            search = %lookup.search,
            normalized = %classified.normalized,
            kind = ?classified.kind,
            "Classified search"
        );

        match classified.kind {
            SearchKind::Fingerprint {
                fingerprint_upper,
                key_id,
            } => self.by_fingerprint(KeyLocator {
                key_id,
                fingerprint_upper,
            }),
            SearchKind::KeyId(key_id) => self.by_key_id(key_id),
            SearchKind::Keyword => {
                let filter = if lookup.exact {
                    ScanFilter::PrimaryUserIdEquals(lookup.search.clone())
                } else {
                    ScanFilter::Contains(lookup.search.clone())
                };
                self.by_keyword(filter)
            }
        }
    }

    fn by_fingerprint(&self, locator: KeyLocator) -> Generator<KeyMetadata> {
        let store = self.store.clone();
        Generator::new(move |y| async move {
            if let Some(record) = store.get(&locator).await? {
                y.yield_item(KeyMetadata::from_record(record)).await?;
            }
            Ok(())
        })
    }

    fn by_key_id(&self, key_id: String) -> Generator<KeyMetadata> {
        let store = self.store.clone();
        let limit = self.page_limit.get();
        Generator::new(move |y| async move {
            yield_pages(&y, |continuation| {
                let store = store.clone();
                let query = PartitionQuery {
                    key_id: key_id.clone(),
                    continuation,
                    limit,
                };
                async move { store.query(&query).await }
            })
            .await
        })
    }

    fn by_keyword(&self, filter: ScanFilter) -> Generator<KeyMetadata> {
        debug!(expression = %filter.expression(), term = %filter.term(), "Keyword scan");
        let store = self.store.clone();
        let limit = self.page_limit.get();
        Generator::new(move |y| async move {
            yield_pages(&y, |continuation| {
                let store = store.clone();
                let scan = FilteredScan {
                    filter: filter.clone(),
                    continuation,
                    limit,
                };
                async move { store.scan(&scan).await }
            })
            .await
        })
    }
}

/// Yield every record of every page, fetching the next page only after the
/// current one is delivered
async fn yield_pages<F, Fut>(y: &Yielder<KeyMetadata>, mut fetch: F) -> Result<()>
where
    F: FnMut(Option<ContinuationToken>) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    let mut continuation = None;
    let mut pages = 0usize;
    loop {
        let page = fetch(continuation.take()).await?;
        pages += 1;
        debug!(page = pages, records = page.records.len(), more = page.continuation.is_some(), "Fetched page");

        for record in page.records {
            y.yield_item(KeyMetadata::from_record(record)).await?;
        }

        match page.continuation {
            Some(next) => continuation = Some(next),
            None => return Ok(()),
        }
    }
}
