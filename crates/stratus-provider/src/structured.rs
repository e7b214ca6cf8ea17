use std::sync::Arc;

use stratus_types::{ProviderKind, Resource};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::Provider;

/// Pluggable basename construction for the structured provider.
///
/// The default delegates to the resource's own naming dispatch; dedicated
/// builders may impose site-wide conventions instead. Builders must be
/// pure functions of the resource.
pub trait StructuredNameBuilder: Send + Sync {
    fn base_name(&self, resource: &Resource) -> String;
}

struct DispatchNames;

impl StructuredNameBuilder for DispatchNames {
    fn base_name(&self, resource: &Resource) -> String {
        resource.base_name(ProviderKind::Structured)
    }
}

/// The main provider of the toolbox: a fixed-shape, experiment-scoped
/// path and a pluggable name builder.
///
/// Path layout: `/vapp/vconf/experiment/DATE[cutoff]/[mbNNN/]block`.
/// Setting `expected` prefixes the scheme with `x`, routing lookups
/// through the promise machinery.
#[derive(Clone)]
pub struct StructuredProvider {
    vapp: String,
    vconf: String,
    experiment: String,
    block: String,
    member: Option<u32>,
    namespace: String,
    expected: bool,
    builder: Arc<dyn StructuredNameBuilder>,
}

impl StructuredProvider {
    /// Provider for one experiment and block under `namespace`.
    pub fn new(
        vapp: impl Into<String>,
        vconf: impl Into<String>,
        experiment: impl Into<String>,
        block: impl Into<String>,
        namespace: impl Into<String>,
    ) -> ProviderResult<Self> {
        let p = Self {
            vapp: vapp.into(),
            vconf: vconf.into(),
            experiment: experiment.into(),
            block: block.into(),
            member: None,
            namespace: namespace.into(),
            expected: false,
            builder: Arc::new(DispatchNames),
        };
        for (field, value) in [
            ("vapp", &p.vapp),
            ("vconf", &p.vconf),
            ("experiment", &p.experiment),
            ("block", &p.block),
            ("namespace", &p.namespace),
        ] {
            if value.is_empty() {
                return Err(ProviderError::MissingField(field));
            }
        }
        Ok(p)
    }

    /// Ensemble member index, rendered as `mbNNN` in the path.
    pub fn member(mut self, member: u32) -> Self {
        self.member = Some(member);
        self
    }

    /// Mark the resource as expected (promised): the scheme gains an `x`
    /// prefix and lookups go through the promise store.
    pub fn expected(mut self) -> Self {
        self.expected = true;
        self
    }

    /// Replace the basename builder.
    pub fn with_name_builder(mut self, builder: Arc<dyn StructuredNameBuilder>) -> Self {
        self.builder = builder;
        self
    }

    fn date_segment(&self, resource: &Resource) -> String {
        let mut seg = resource.date().format("%Y%m%dT%H%M").to_string();
        // Cutoff letter (A for assim, P for production) sticks to the date.
        if let Some(cutoff) = resource.attr("cutoff") {
            if let Some(first) = cutoff.chars().next() {
                seg.push(first.to_ascii_uppercase());
            }
        }
        seg
    }
}

impl Provider for StructuredProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Structured
    }

    fn scheme(&self, _resource: &Resource) -> String {
        if self.expected {
            "xstratus".to_string()
        } else {
            "stratus".to_string()
        }
    }

    fn netloc(&self, _resource: &Resource) -> String {
        self.namespace.clone()
    }

    fn path_name(&self, resource: &Resource) -> String {
        let mut segments = vec![
            self.vapp.clone(),
            self.vconf.clone(),
            self.experiment.clone(),
            self.date_segment(resource),
        ];
        if let Some(member) = self.member {
            segments.push(format!("mb{member:03}"));
        }
        segments.push(self.block.clone());
        segments.join("/")
    }

    fn base_name(&self, resource: &Resource) -> String {
        self.builder.base_name(resource)
    }
}

impl std::fmt::Debug for StructuredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredProvider")
            .field("vapp", &self.vapp)
            .field("vconf", &self.vconf)
            .field("experiment", &self.experiment)
            .field("block", &self.block)
            .field("member", &self.member)
            .field("namespace", &self.namespace)
            .field("expected", &self.expected)
            .finish()
    }
}
