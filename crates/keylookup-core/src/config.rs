//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::search::PageLimit;

/// Default HTTP port (HKP)
pub const DEFAULT_PORT: u16 = 11371;

/// Configuration for a keylookup deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Key metadata records (JSON array in the store's tagged form)
    pub records_file: PathBuf,
    /// Directory of armored keys, one `<fingerprint>.asc` per key
    pub objects_dir: PathBuf,
    /// Page size for store queries and scans; absent or 0 is unbounded
    #[serde(default)]
    pub page_limit: Option<u32>,
    /// Port the HTTP server listens on
    #[serde(default = "default_port")]
    pub listen_port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ServiceConfig {
    /// Create a configuration from a base directory
    ///
    /// Expects the following structure:
    /// ```text
    /// base_dir/
    ///   records.json
    ///   keys/
    ///     <fingerprint>.asc
    /// ```
    pub fn from_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        Self {
            records_file: base.join("records.json"),
            objects_dir: base.join("keys"),
            page_limit: None,
            listen_port: DEFAULT_PORT,
        }
    }

    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn page_limit(&self) -> PageLimit {
        PageLimit::from(self.page_limit)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_base_dir("./key-data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_base_dir() {
        let config = ServiceConfig::from_base_dir("/data/keys");
        assert_eq!(config.records_file, PathBuf::from("/data/keys/records.json"));
        assert_eq!(config.objects_dir, PathBuf::from("/data/keys/keys"));
        assert_eq!(config.page_limit(), PageLimit::UNBOUNDED);
    }

    #[test]
    fn test_config_defaults_when_fields_absent() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"records_file": "r.json", "objects_dir": "objs"}"#).unwrap();
        assert_eq!(config.listen_port, DEFAULT_PORT);
        assert_eq!(config.page_limit, None);
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ServiceConfig::from_base_dir(dir.path())
            .with_page_limit(Some(50))
            .with_port(8080);

        config.save(&path).unwrap();
        let loaded = ServiceConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.page_limit().get(), Some(50));
    }
}
