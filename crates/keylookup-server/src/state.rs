//! Server state: the lookup service and what it was loaded from

use std::sync::Arc;

use keylookup_core::{KeyService, KeyStore, MemoryKeyStore, MemoryObjectStore, ObjectStore, ServiceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::error::{Result, ServerError};

/// Shared state behind every route
pub struct ServerState {
    pub service: KeyService,
    pub config: ServiceConfig,
    pub stats: StoreStats,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

/// Sizes of the loaded stores
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    pub records: usize,
    pub objects: usize,
}

impl ServerState {
    /// Build state over already constructed stores
    pub fn new(
        keys: Arc<dyn KeyStore>,
        objects: Arc<dyn ObjectStore>,
        config: ServiceConfig,
        stats: StoreStats,
    ) -> Self {
        let service = KeyService::new(keys, objects, config.page_limit());
        Self {
            service,
            config,
            stats,
            metrics: None,
        }
    }

    /// Load the in-memory stores named by `config`
    pub fn load(config: ServiceConfig) -> Result<Self> {
        if !config.records_file.exists() {
            return Err(ServerError::Internal(format!(
                "Records file not found: {}",
                config.records_file.display()
            )));
        }

        let keys = MemoryKeyStore::load(&config.records_file)?;
        let objects = MemoryObjectStore::load_dir(&config.objects_dir)?;
        let stats = StoreStats {
            records: keys.len(),
            objects: objects.len(),
        };

        tracing::info!(
            records = stats.records,
            objects = stats.objects,
            page_limit = ?config.page_limit,
            "Stores loaded"
        );
        crate::metrics::set_records_loaded(stats.records, stats.objects);

        Ok(Self::new(Arc::new(keys), Arc::new(objects), config, stats))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Shared server state type
pub type SharedState = Arc<ServerState>;
