use std::io::SeekFrom;
use std::io::{Seek, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{ContainerError, ContainerResult};
use crate::traits::{Container, IoHandle, IoMode, DEFAULT_READ_CAP};

/// Temp-file-backed container for short-lived intermediate data.
///
/// Always lives on disk under a generated name. By default the backing
/// file disappears with the container; `keep()` opts out, leaving the
/// file behind for inspection.
pub struct Ephemeral {
    prefix: String,
    keep: bool,
    cap: u64,
    file: Option<NamedTempFile>,
    filled: bool,
}

impl Ephemeral {
    pub fn new() -> Self {
        Self {
            prefix: "stratus.tmp.".to_string(),
            keep: false,
            cap: DEFAULT_READ_CAP,
            file: None,
            filled: false,
        }
    }

    /// Temp-file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Leave the backing file on disk when the container goes away.
    pub fn keep(mut self) -> Self {
        self.keep = true;
        self
    }

    /// Override the whole-content read cap.
    pub fn with_read_cap(mut self, cap: u64) -> Self {
        self.cap = cap;
        self
    }

    fn ensure(&mut self) -> ContainerResult<&mut NamedTempFile> {
        if self.file.is_none() {
            let file = tempfile::Builder::new().prefix(&self.prefix).tempfile()?;
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("file was just created"))
    }
}

impl Default for Ephemeral {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for Ephemeral {
    fn local_path(&mut self) -> ContainerResult<PathBuf> {
        Ok(self.ensure()?.path().to_path_buf())
    }

    fn io_handle(&mut self, mode: IoMode) -> ContainerResult<&mut dyn IoHandle> {
        let file = self.ensure()?;
        match mode {
            IoMode::Append => {
                file.seek(SeekFrom::End(0))?;
            }
            IoMode::Write => {
                file.as_file_mut().set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
            }
            IoMode::Read => {}
        }
        Ok(file)
    }

    fn write(&mut self, data: &[u8]) -> ContainerResult<()> {
        let handle = self.io_handle(IoMode::Write)?;
        handle.write_all(data)?;
        handle.flush()?;
        self.filled = true;
        Ok(())
    }

    fn clear(&mut self) -> ContainerResult<()> {
        match self.file.take() {
            Some(file) if self.keep => {
                file.into_temp_path()
                    .keep()
                    .map_err(|e| ContainerError::Io(e.error))?;
            }
            _ => {} // Dropping the NamedTempFile removes it.
        }
        self.filled = false;
        Ok(())
    }

    fn is_filled(&self) -> bool {
        self.filled
    }

    fn update_fill(&mut self, fetched: bool) {
        if fetched {
            self.filled = true;
        }
    }

    fn read_cap(&self) -> u64 {
        self.cap
    }
}

impl Drop for Ephemeral {
    fn drop(&mut self) {
        if self.keep {
            if let Some(file) = self.file.take() {
                if let Err(e) = file.into_temp_path().keep() {
                    warn!(error = %e, "could not keep ephemeral container file");
                }
            }
        }
    }
}

impl std::fmt::Debug for Ephemeral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ephemeral")
            .field("keep", &self.keep)
            .field("materialized", &self.file.is_some())
            .field("filled", &self.filled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_roundtrip() {
        let mut c = Ephemeral::new();
        c.write(b"short lived").unwrap();
        assert!(c.is_filled());
        assert_eq!(c.read_all().unwrap(), b"short lived");
    }

    #[test]
    fn backing_file_vanishes_on_clear() {
        let mut c = Ephemeral::new();
        c.write(b"x").unwrap();
        let path = c.local_path().unwrap();
        assert!(path.exists());
        c.clear().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn kept_file_survives_drop() {
        let path;
        {
            let mut c = Ephemeral::new().keep();
            c.write(b"survivor").unwrap();
            path = c.local_path().unwrap();
        }
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"survivor");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rewrite_truncates_previous_content() {
        let mut c = Ephemeral::new();
        c.write(b"a much longer first payload").unwrap();
        c.write(b"tiny").unwrap();
        assert_eq!(c.read_all().unwrap(), b"tiny");
    }
}
