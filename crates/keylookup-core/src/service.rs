//! The lookup operations exposed to the HTTP layer

use std::sync::Arc;

use tracing::debug;

use crate::attribute::KeyMetadata;
use crate::format::{format_indices, format_keys, Formatted, IndexFormat};
use crate::lookup::SearchingLookup;
use crate::result::{async_result, AsyncResult};
use crate::search::{classify, PageLimit, SearchKind, SearchResolver};
use crate::sequence::{FallibleSequence, Generator, Step};
use crate::store::{ByteStream, KeyStore, ObjectStore};
use crate::Error;

/// Key lookups over injected store handles
#[derive(Clone)]
pub struct KeyService {
    resolver: SearchResolver,
    objects: Arc<dyn ObjectStore>,
}

impl KeyService {
    pub fn new(keys: Arc<dyn KeyStore>, objects: Arc<dyn ObjectStore>, page_limit: PageLimit) -> Self {
        Self {
            resolver: SearchResolver::new(keys, page_limit),
            objects,
        }
    }

    pub fn resolver(&self) -> &SearchResolver {
        &self.resolver
    }

    /// Index of every key the search matches
    pub fn best_guess_index<'a>(&'a self, lookup: &'a SearchingLookup) -> AsyncResult<'a, Formatted> {
        async_result(async move {
            let format = if lookup.wants_json() {
                IndexFormat::Json
            } else {
                IndexFormat::MachineReadable
            };
            let mut keys = self.resolver.resolve(lookup);
            format_indices(&mut keys, format).await
        })
    }

    /// Armored keys for every key the search matches
    pub fn best_guess_retrieval<'a>(&'a self, lookup: &'a SearchingLookup) -> AsyncResult<'a, Formatted> {
        async_result(async move {
            let mut streams = self.key_streams(self.resolver.resolve(lookup));
            format_keys(&mut streams).await
        })
    }

    /// Armored key for a full fingerprint; other searches are rejected
    pub fn fingerprint_retrieval<'a>(&'a self, lookup: &'a SearchingLookup) -> AsyncResult<'a, Formatted> {
        async_result(async move {
            if !matches!(classify(&lookup.search).kind, SearchKind::Fingerprint { .. }) {
                return Err(Error::InvalidSearch(format!(
                    "exact retrieval needs a full fingerprint, got {:?}",
                    lookup.search
                )));
            }
            let mut streams = self.key_streams(self.resolver.resolve(lookup));
            format_keys(&mut streams).await
        })
    }

    /// Map each resolved key to its stored object
    ///
    /// A failed fetch, or a consumer closing with a failure, is handed on to
    /// the metadata sequence so it can release whatever page it holds.
    fn key_streams(&self, mut keys: Generator<KeyMetadata>) -> Generator<ByteStream> {
        let objects = self.objects.clone();
        Generator::new(move |y| async move {
            loop {
                match keys.pull().await {
                    Step::Item(meta) => {
                        let name = meta.object_name();
                        debug!(object = %name, "Fetching key object");
                        let stream = match objects.get_object(&name).await {
                            Ok(stream) => stream,
                            Err(cause) => return keys.close(Err(cause)).await,
                        };
                        if let Err(cause) = y.yield_item(stream).await {
                            return keys.close(Err(cause)).await;
                        }
                    }
                    Step::Done(outcome) => return outcome,
                    Step::Exhausted => return Ok(()),
                }
            }
        })
    }
}
