use std::str::FromStr;

use stratus_types::{ProviderKind, Resource, Uri};

use crate::error::ProviderResult;
use crate::traits::Provider;

/// Provider that always returns one fixed URI.
///
/// Used for constant fixtures: the resource plays no part in the answer.
#[derive(Clone, Debug)]
pub struct MagicProvider {
    magic: Uri,
}

impl MagicProvider {
    /// Build from an already-parsed URI.
    pub fn new(magic: Uri) -> Self {
        Self { magic }
    }

    /// Build from a URI string.
    pub fn parse(magic: &str) -> ProviderResult<Self> {
        Ok(Self::new(Uri::from_str(magic)?))
    }
}

impl Provider for MagicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Magic
    }

    fn scheme(&self, _resource: &Resource) -> String {
        self.magic.scheme.clone()
    }

    fn netloc(&self, _resource: &Resource) -> String {
        self.magic.netloc.clone()
    }

    fn path_name(&self, _resource: &Resource) -> String {
        match self.magic.path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        }
    }

    fn base_name(&self, _resource: &Resource) -> String {
        match self.magic.path.rsplit_once('/') {
            Some((_, base)) => base.to_string(),
            None => self.magic.path.clone(),
        }
    }

    fn url_query(&self, _resource: &Resource) -> Option<String> {
        self.magic.query.clone()
    }

    fn uri(&self, _resource: &Resource) -> Uri {
        // The URI is supposed to be the magic value.
        self.magic.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stratus_types::DataFormat;

    #[test]
    fn ignores_the_resource_entirely() {
        let p = MagicProvider::parse("file://localhost/tmp/fixtures/const.dat").unwrap();
        let a = Resource::new(
            "analysis",
            Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap(),
            DataFormat::Fa,
        );
        let b = Resource::new(
            "gridpoint",
            Utc.with_ymd_and_hms(1999, 12, 31, 18, 0, 0).unwrap(),
            DataFormat::Grib,
        );
        assert_eq!(p.uri(&a), p.uri(&b));
        assert_eq!(p.uri(&a).to_string(), "file://localhost/tmp/fixtures/const.dat");
    }

    #[test]
    fn rejects_malformed_magic() {
        assert!(MagicProvider::parse("no scheme here").is_err());
    }
}
