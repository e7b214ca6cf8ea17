use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};
use crate::format::DataFormat;

/// Suffix appended to an item path to name its promise token.
pub const PROMISE_SUFFIX: &str = ".pr";

/// On-disk descriptor for a promised (not yet available) resource.
///
/// Written in place of real data when a producer wants to register intent
/// before the data exists. Consumers poll: as long as the token file named
/// by `itself` exists, the data is still pending; its disappearance means
/// fulfillment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseNote {
    /// Local token path whose existence means "still pending".
    pub itself: PathBuf,
    /// Semicolon-joined candidate remote paths for the real data.
    pub locate: String,
    /// Creation stamp (informative only, excluded from comparisons by
    /// consumers that deduplicate promises).
    pub stamp: String,
    /// Format of the promised payload, when known.
    pub datafmt: Option<DataFormat>,
}

impl PromiseNote {
    /// Candidate remote locations, in priority order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.locate.split(';').filter(|s| !s.is_empty())
    }

    /// Returns `true` while the token file still exists.
    pub fn pending(&self) -> bool {
        self.itself.exists()
    }

    /// Read a promise note from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)?;
        serde_json::from_str(&body)
            .map_err(|e| TypeError::InvalidPromise(format!("{}: {e}", path.display())))
    }

    /// Write the note as JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(dir: &Path) -> PromiseNote {
        PromiseNote {
            itself: dir.join("promises/a/b.grib.pr"),
            locate: "/cache/a/b.grib;/archive/a/b.grib".to_string(),
            stamp: "20240114T000000".to_string(),
            datafmt: Some(DataFormat::Grib),
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let n = note(dir.path());
        let file = dir.path().join("b.grib.pr.json");
        n.save(&file).unwrap();
        assert_eq!(PromiseNote::load(&file).unwrap(), n);
    }

    #[test]
    fn candidates_split_on_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let n = note(dir.path());
        let c: Vec<&str> = n.candidates().collect();
        assert_eq!(c, vec!["/cache/a/b.grib", "/archive/a/b.grib"]);
    }

    #[test]
    fn pending_follows_token_existence() {
        let dir = tempfile::tempdir().unwrap();
        let mut n = note(dir.path());
        n.itself = dir.path().join("token.pr");
        assert!(!n.pending());
        fs::write(&n.itself, b"{}").unwrap();
        assert!(n.pending());
        fs::remove_file(&n.itself).unwrap();
        assert!(!n.pending());
    }

    #[test]
    fn malformed_note_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.pr");
        fs::write(&file, b"not json at all").unwrap();
        assert!(matches!(
            PromiseNote::load(&file),
            Err(TypeError::InvalidPromise(_))
        ));
    }
}
