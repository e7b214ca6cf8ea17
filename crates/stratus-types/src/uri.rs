use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Canonical location of a resource: `(scheme, netloc, path, query)`.
///
/// The URI is the identity key used by callers to deduplicate and cache
/// lookups, so construction is normalizing: the path never contains empty
/// segments, `.` or `..` components. Two semantically identical resources
/// must map to byte-identical URIs under the same provider configuration.
///
/// The "expected/promised" variant of a backend family is encoded as the
/// plain scheme prefixed with `x` (e.g. `xstratus` for `stratus`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    /// Backend family selector (e.g. `stratus`, `file`, `ftp`).
    pub scheme: String,
    /// Store selector, possibly with a `user@` prefix.
    pub netloc: String,
    /// Normalized, `/`-rooted item path.
    pub path: String,
    /// Optional query string (sorted `k=v` pairs joined with `&`).
    pub query: Option<String>,
}

impl Uri {
    /// Build a URI, normalizing `path`.
    pub fn new(
        scheme: impl Into<String>,
        netloc: impl Into<String>,
        path: &str,
        query: Option<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            netloc: netloc.into(),
            path: normalize_path(path),
            query: query.filter(|q| !q.is_empty()),
        }
    }

    /// Returns `true` for the promised variant of a scheme (`x` prefix).
    pub fn is_expected(&self) -> bool {
        self.scheme.len() > 1 && self.scheme.starts_with('x')
    }

    /// The scheme with any `x` (expected) prefix removed.
    pub fn proxy_scheme(&self) -> &str {
        if self.is_expected() {
            &self.scheme[1..]
        } else {
            &self.scheme
        }
    }

    /// Netloc with any `user@` prefix removed.
    pub fn hostname(&self) -> &str {
        match self.netloc.rsplit_once('@') {
            Some((_, host)) => host,
            None => &self.netloc,
        }
    }

    /// The `user` part of a `user@host` netloc, if present.
    pub fn username(&self) -> Option<&str> {
        self.netloc.rsplit_once('@').map(|(user, _)| user)
    }

    /// Item path relative to the store entry (leading `/` stripped).
    pub fn item(&self) -> &str {
        self.path.trim_start_matches('/')
    }
}

/// Collapse separators and resolve `.`/`..` segments.
///
/// `..` pops the previous segment; a `..` at the root is dropped. The
/// result always starts with a single `/`.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    out.push_str(&segments.join("/"));
    out
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.netloc, self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{q}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Uri {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| TypeError::MalformedUri(s.to_string()))?;
        if scheme.is_empty() {
            return Err(TypeError::MalformedUri(s.to_string()));
        }
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q.to_string())),
            None => (rest, None),
        };
        let (netloc, path) = match rest.split_once('/') {
            Some((n, p)) => (n, p),
            None => (rest, ""),
        };
        Ok(Uri::new(scheme, netloc, path, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn path_is_normalized() {
        let uri = Uri::new("stratus", "stratus.cache.local", "a//b/./c/../d", None);
        assert_eq!(uri.path, "/a/b/d");
    }

    #[test]
    fn parent_escape_is_clamped_at_root() {
        let uri = Uri::new("stratus", "stratus.cache.local", "/../../etc/passwd", None);
        assert_eq!(uri.path, "/etc/passwd");
    }

    #[test]
    fn expected_scheme_detection() {
        let uri = Uri::new("xstratus", "stratus.multi.local", "/a/b", None);
        assert!(uri.is_expected());
        assert_eq!(uri.proxy_scheme(), "stratus");
        let plain = Uri::new("stratus", "stratus.multi.local", "/a/b", None);
        assert!(!plain.is_expected());
    }

    #[test]
    fn netloc_username_split() {
        let uri = Uri::new("ftp", "ops@archive.local", "/x/y", None);
        assert_eq!(uri.hostname(), "archive.local");
        assert_eq!(uri.username(), Some("ops"));
    }

    #[test]
    fn display_parse_roundtrip() {
        let uri = Uri::new(
            "stratus",
            "stratus.cache.local",
            "/arome/3dvarfr/ABCD/20240114T0000A/forecast/grid.arome.tl1798.fc.grib",
            Some("member=003".to_string()),
        );
        let reparsed = Uri::from_str(&uri.to_string()).unwrap();
        assert_eq!(reparsed, uri);
    }

    #[test]
    fn empty_query_is_dropped() {
        let uri = Uri::new("stratus", "n", "/p", Some(String::new()));
        assert_eq!(uri.query, None);
    }
}
