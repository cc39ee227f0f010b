//! Lookup requests

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Machine-readable index output
pub const OPTION_MACHINE_READABLE: &str = "mr";

/// JSON index output
pub const OPTION_JSON: &str = "json";

/// A lookup as received from the outer layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub operation: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub exact: bool,
}

impl Lookup {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }
}

/// A [`Lookup`] whose search text is known to be present
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchingLookup {
    pub operation: String,
    pub search: String,
    pub options: Vec<String>,
    pub exact: bool,
}

impl SearchingLookup {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// JSON only when asked for and machine-readable was not
    pub fn wants_json(&self) -> bool {
        self.has_option(OPTION_JSON) && !self.has_option(OPTION_MACHINE_READABLE)
    }
}

impl TryFrom<Lookup> for SearchingLookup {
    type Error = Error;

    fn try_from(lookup: Lookup) -> Result<Self> {
        let search = lookup
            .search
            .ok_or_else(|| Error::InvalidSearch("missing search parameter".to_string()))?;

        Ok(Self {
            operation: lookup.operation,
            search,
            options: lookup.options,
            exact: lookup.exact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searching_requires_search() {
        let missing = SearchingLookup::try_from(Lookup::new("index"));
        assert!(matches!(missing, Err(Error::InvalidSearch(_))));

        let present = SearchingLookup::try_from(Lookup::new("index").with_search("alice")).unwrap();
        assert_eq!(present.search, "alice");
        assert_eq!(present.operation, "index");
    }

    #[test]
    fn test_output_mode_selection() {
        let base = Lookup::new("index").with_search("alice");

        let default = SearchingLookup::try_from(base.clone()).unwrap();
        assert!(!default.wants_json());

        let json = SearchingLookup::try_from(base.clone().with_option("json")).unwrap();
        assert!(json.wants_json());

        let both = SearchingLookup::try_from(base.with_option("json").with_option("mr")).unwrap();
        assert!(!both.wants_json());
    }
}
