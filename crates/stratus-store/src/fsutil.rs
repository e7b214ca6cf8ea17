//! Filesystem helpers shared by the cache and the file tube.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use walkdir::WalkDir;

/// Destination suffixes treated as archives for extraction purposes.
const ARCHIVE_SUFFIXES: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

pub(crate) fn looks_like_archive(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    ARCHIVE_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Copy `source` to `dest` through a hidden sibling, then rename into
/// place. Concurrent readers on a shared filesystem never observe a
/// partial file.
pub(crate) fn copy_file_atomic(source: &Path, dest: &Path) -> io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let hidden = parent.join(format!(
        ".{}.{}.tmp",
        dest.file_name().and_then(|n| n.to_str()).unwrap_or("item"),
        std::process::id()
    ));
    fs::copy(source, &hidden)?;
    match fs::rename(&hidden, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&hidden);
            Err(e)
        }
    }
}

/// Recursively copy the tree rooted at `source` under `dest`.
pub(crate) fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Unpack a recognized archive next to itself. Returns the directory the
/// entries were extracted into.
pub(crate) fn extract_archive(archive: &Path) -> io::Result<PathBuf> {
    let into = archive
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file = fs::File::open(archive)?;
    let name = archive.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        tar::Archive::new(GzDecoder::new(file)).unpack(&into)?;
    } else {
        tar::Archive::new(file).unpack(&into)?;
    }
    Ok(into)
}
