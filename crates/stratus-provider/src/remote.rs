use serde::{Deserialize, Serialize};

use stratus_types::{ProviderKind, Resource};

use crate::traits::Provider;

/// Transport used to reach a remote path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TubeKind {
    /// Plain filesystem copy.
    #[default]
    File,
    /// Symbolic link instead of a copy.
    Symlink,
    /// FTP transfer.
    Ftp,
    /// Secure remote copy.
    Scp,
    /// Legacy remote copy.
    Rcp,
}

impl TubeKind {
    /// The URI scheme advertising this tube.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Ftp => "ftp",
            Self::Scp => "scp",
            Self::Rcp => "rcp",
        }
    }
}

impl std::fmt::Display for TubeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Provider for data addressed by an explicit path on a known host.
///
/// The resource's own naming plays no part: the path is authoritative.
/// Relative paths are advertised through the `relative=1` query so the
/// resolving store can anchor them.
#[derive(Clone, Debug)]
pub struct RemoteProvider {
    remote: String,
    hostname: String,
    username: Option<String>,
    tube: TubeKind,
}

impl RemoteProvider {
    /// Provider for `remote` on localhost over a plain file copy.
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            hostname: "localhost".to_string(),
            username: None,
            tube: TubeKind::File,
        }
    }

    /// The host holding the data.
    pub fn on_host(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Username for transports that need one.
    pub fn as_user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Transport selection.
    pub fn via(mut self, tube: TubeKind) -> Self {
        self.tube = tube;
        self
    }

    /// The configured transport.
    pub fn tube(&self) -> TubeKind {
        self.tube
    }
}

impl Provider for RemoteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    fn scheme(&self, _resource: &Resource) -> String {
        self.tube.scheme().to_string()
    }

    fn netloc(&self, _resource: &Resource) -> String {
        self.hostname.clone()
    }

    fn username(&self, _resource: &Resource) -> Option<&str> {
        self.username.as_deref()
    }

    fn path_name(&self, _resource: &Resource) -> String {
        match self.remote.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        }
    }

    fn base_name(&self, _resource: &Resource) -> String {
        match self.remote.rsplit_once('/') {
            Some((_, base)) => base.to_string(),
            None => self.remote.clone(),
        }
    }

    fn url_query(&self, _resource: &Resource) -> Option<String> {
        if self.remote.starts_with('/') {
            None
        } else {
            Some("relative=1".to_string())
        }
    }
}
