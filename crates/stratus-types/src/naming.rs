use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// The family a provider belongs to.
///
/// Naming dispatch is keyed on this tag: a resource may register a
/// dedicated [`NamingStrategy`] per provider kind and falls back to the
/// structured default otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Fixed-URI provider, for constants and test fixtures.
    Magic,
    /// Direct host/path provider.
    Remote,
    /// Experiment-scoped structured provider.
    Structured,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Magic => write!(f, "magic"),
            Self::Remote => write!(f, "remote"),
            Self::Structured => write!(f, "structured"),
        }
    }
}

/// Anonymous naming facts extracted from a resource.
///
/// Providers consume this when building directory segments; the keys are
/// free-form but stable for a given resource kind.
pub type PathInfo = BTreeMap<String, String>;

/// Naming rules for one (resource kind, provider kind) pair.
///
/// Implementations must be pure: identical resources always yield
/// identical outputs. Nothing here may touch the filesystem or clock.
pub trait NamingStrategy: Send + Sync {
    /// Facts a provider may use to build the directory part of a URI.
    fn path_info(&self, resource: &Resource) -> PathInfo;

    /// The file basename for the resource.
    fn base_name(&self, resource: &Resource) -> String;

    /// Optional query string attached to the resource location.
    fn url_query(&self, _resource: &Resource) -> Option<String> {
        None
    }
}

/// Structured default naming, used when no dedicated strategy is
/// registered for a provider kind.
///
/// The basename is `kind.[attrs.].YYYYMMDDTHHMM.format` with attribute
/// values joined in key order, so it is deterministic by construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNaming;

impl NamingStrategy for DefaultNaming {
    fn path_info(&self, resource: &Resource) -> PathInfo {
        let mut info = PathInfo::new();
        info.insert("kind".to_string(), resource.kind().to_string());
        info.insert("nativefmt".to_string(), resource.format().to_string());
        for (k, v) in resource.attrs() {
            info.insert(k.clone(), v.clone());
        }
        info
    }

    fn base_name(&self, resource: &Resource) -> String {
        let mut parts: Vec<String> = vec![resource.kind().to_string()];
        parts.extend(resource.attrs().values().cloned());
        parts.push(resource.date().format("%Y%m%dT%H%M").to_string());
        parts.push(resource.format().to_string());
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::format::DataFormat;

    fn gridpoint() -> Resource {
        Resource::new(
            "gridpoint",
            Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap(),
            DataFormat::Grib,
        )
        .with_attr("model", "arome")
        .with_attr("term", "0006")
    }

    #[test]
    fn default_basename_is_deterministic() {
        let a = DefaultNaming.base_name(&gridpoint());
        let b = DefaultNaming.base_name(&gridpoint());
        assert_eq!(a, b);
        assert_eq!(a, "gridpoint.arome.0006.20240114T0000.grib");
    }

    #[test]
    fn path_info_carries_kind_and_attrs() {
        let info = DefaultNaming.path_info(&gridpoint());
        assert_eq!(info.get("kind").map(String::as_str), Some("gridpoint"));
        assert_eq!(info.get("model").map(String::as_str), Some("arome"));
        assert_eq!(info.get("nativefmt").map(String::as_str), Some("grib"));
    }
}
