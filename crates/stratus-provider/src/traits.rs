use tracing::debug;

use stratus_types::{ProviderKind, Resource, Uri};

/// Strategy computing the canonical location of a resource.
///
/// `uri()` must be referentially transparent: for a fixed provider
/// configuration, two resources with identical semantic attributes yield
/// byte-identical URIs. Callers rely on this to deduplicate lookups.
pub trait Provider: Send + Sync {
    /// The provider family, used for resource naming dispatch.
    fn kind(&self) -> ProviderKind;

    /// URI scheme selecting the backend family.
    fn scheme(&self, resource: &Resource) -> String;

    /// Network location selecting the store instance.
    fn netloc(&self, resource: &Resource) -> String;

    /// Username folded into the netloc as `user@host`, when set.
    fn username(&self, _resource: &Resource) -> Option<&str> {
        None
    }

    /// Directory part of the resource location.
    fn path_name(&self, resource: &Resource) -> String;

    /// File basename; delegates to the resource's naming dispatch.
    fn base_name(&self, resource: &Resource) -> String {
        resource.base_name(self.kind())
    }

    /// Optional query string; delegates to the resource's naming dispatch.
    fn url_query(&self, resource: &Resource) -> Option<String> {
        resource.url_query(self.kind())
    }

    /// Compose the canonical URI for `resource`.
    ///
    /// Scheme, netloc, `pathname/basename` (normalized) and query are
    /// assembled from the dedicated methods; implementations usually
    /// override those rather than this.
    fn uri(&self, resource: &Resource) -> Uri {
        let netloc = match self.username(resource) {
            Some(user) => format!("{user}@{}", self.netloc(resource)),
            None => self.netloc(resource),
        };
        let path = format!("{}/{}", self.path_name(resource), self.base_name(resource));
        let uri = Uri::new(
            self.scheme(resource),
            netloc,
            &path,
            self.url_query(resource),
        );
        debug!(%uri, kind = %self.kind(), "provider located resource");
        uri
    }
}
