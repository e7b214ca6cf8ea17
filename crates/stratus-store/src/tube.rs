use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::fsutil;
use crate::traits::StatInfo;

/// Transport moving bytes between a local path and an archive location.
///
/// Tubes are dumb pipes: no history, no readonly policy, no retries. The
/// owning [`ArchiveStore`](crate::ArchiveStore) layers those on top.
/// Remote locations are plain path strings in the archive's namespace.
pub trait Tube: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    /// Stat the remote location; `None` means absent or unreachable.
    fn check(&self, location: &str) -> Option<StatInfo>;

    /// Fetch the remote location into a local file.
    fn retrieve(&self, location: &str, dest: &Path) -> StoreResult<bool>;

    /// Send a local file to the remote location.
    fn insert(&self, source: &Path, location: &str) -> StoreResult<bool>;

    /// Remove the remote location.
    fn delete(&self, location: &str) -> StoreResult<bool>;
}

/// Fallback tube: the "remote" is just another mounted filesystem.
///
/// With `symlink` set, retrieve points a symbolic link at the source
/// instead of copying. Useful for huge constant files that are never
/// modified in place.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileTube {
    symlink: bool,
}

impl FileTube {
    pub fn new() -> Self {
        Self { symlink: false }
    }

    pub fn symlinking() -> Self {
        Self { symlink: true }
    }
}

impl Tube for FileTube {
    fn name(&self) -> &'static str {
        if self.symlink {
            "symlink"
        } else {
            "file"
        }
    }

    fn check(&self, location: &str) -> Option<StatInfo> {
        fs::metadata(location).ok().map(|m| StatInfo::from(&m))
    }

    fn retrieve(&self, location: &str, dest: &Path) -> StoreResult<bool> {
        let source = Path::new(location);
        if !source.exists() {
            debug!(location, "file tube retrieve miss");
            return Ok(false);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.symlink {
            if dest.symlink_metadata().is_ok() {
                fs::remove_file(dest)?;
            }
            std::os::unix::fs::symlink(source, dest)?;
        } else if source.is_dir() {
            fsutil::copy_tree(source, dest)?;
        } else {
            fs::copy(source, dest)?;
        }
        Ok(true)
    }

    fn insert(&self, source: &Path, location: &str) -> StoreResult<bool> {
        if !source.exists() {
            warn!(source = %source.display(), "file tube insert: no such source");
            return Ok(false);
        }
        let dest = Path::new(location);
        if source.is_dir() {
            fs::create_dir_all(dest)?;
            fsutil::copy_tree(source, dest)?;
        } else {
            fsutil::copy_file_atomic(source, dest)?;
        }
        Ok(true)
    }

    fn delete(&self, location: &str) -> StoreResult<bool> {
        let target = Path::new(location);
        match fs::symlink_metadata(target) {
            Err(_) => Ok(false),
            Ok(meta) if meta.is_dir() => {
                fs::remove_dir_all(target)?;
                Ok(true)
            }
            Ok(_) => {
                fs::remove_file(target)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote/x/y.grib");
        let src = dir.path().join("local.grib");
        fs::write(&src, b"grib bytes").unwrap();

        let tube = FileTube::new();
        assert!(tube
            .insert(&src, remote.to_str().unwrap())
            .unwrap());
        assert!(tube.check(remote.to_str().unwrap()).is_some());

        let back = dir.path().join("fetched.grib");
        assert!(tube
            .retrieve(remote.to_str().unwrap(), &back)
            .unwrap());
        assert_eq!(fs::read(&back).unwrap(), b"grib bytes");

        assert!(tube.delete(remote.to_str().unwrap()).unwrap());
        assert!(!tube.delete(remote.to_str().unwrap()).unwrap());
    }

    #[test]
    fn symlink_mode_links_instead_of_copying() {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("const.dat");
        fs::write(&remote, b"constant").unwrap();

        let tube = FileTube::symlinking();
        let local = dir.path().join("work/const.dat");
        assert!(tube
            .retrieve(remote.to_str().unwrap(), &local)
            .unwrap());
        assert!(local.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&local).unwrap(), b"constant");
    }

    #[test]
    fn missing_source_is_a_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tube = FileTube::new();
        assert!(!tube
            .insert(&dir.path().join("nope"), "/tmp/never")
            .unwrap());
        assert!(!tube
            .retrieve(dir.path().join("nope").to_str().unwrap(), &dir.path().join("d"))
            .unwrap());
    }
}
