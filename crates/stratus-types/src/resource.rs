use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::format::DataFormat;
use crate::naming::{DefaultNaming, NamingStrategy, PathInfo, ProviderKind};

/// Immutable description of a data item's semantics.
///
/// A resource says *what* a piece of data is (kind, validity date, native
/// format and any domain attributes), never *where* it lives. Location is
/// the provider's job. Resources are never mutated after construction;
/// the `with_*` methods consume and return the builder value.
#[derive(Clone)]
pub struct Resource {
    kind: String,
    date: DateTime<Utc>,
    format: DataFormat,
    attrs: BTreeMap<String, String>,
    naming: BTreeMap<ProviderKind, Arc<dyn NamingStrategy>>,
}

impl Resource {
    /// Describe a new resource.
    pub fn new(kind: impl Into<String>, date: DateTime<Utc>, format: DataFormat) -> Self {
        Self {
            kind: kind.into(),
            date,
            format,
            attrs: BTreeMap::new(),
            naming: BTreeMap::new(),
        }
    }

    /// Attach a domain attribute (model, term, geometry, ...).
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Register a dedicated naming strategy for one provider kind.
    pub fn with_naming(
        mut self,
        provider: ProviderKind,
        strategy: Arc<dyn NamingStrategy>,
    ) -> Self {
        self.naming.insert(provider, strategy);
        self
    }

    /// The resource kind tag (e.g. `gridpoint`, `analysis`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Validity date of the data.
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Native data format.
    pub fn format(&self) -> DataFormat {
        self.format
    }

    /// Domain attributes, in key order.
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    /// One domain attribute, if set.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn strategy(&self, provider: ProviderKind) -> &dyn NamingStrategy {
        match self.naming.get(&provider) {
            Some(strategy) => strategy.as_ref(),
            None => &DefaultNaming,
        }
    }

    /// Naming facts for the given provider kind.
    pub fn path_info(&self, provider: ProviderKind) -> PathInfo {
        self.strategy(provider).path_info(self)
    }

    /// File basename for the given provider kind.
    pub fn base_name(&self, provider: ProviderKind) -> String {
        self.strategy(provider).base_name(self)
    }

    /// Optional URL query for the given provider kind.
    pub fn url_query(&self, provider: ProviderKind) -> Option<String> {
        self.strategy(provider).url_query(self)
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("date", &self.date)
            .field("format", &self.format)
            .field("attrs", &self.attrs)
            .finish()
    }
}
