use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ContainerError, ContainerResult};
use crate::traits::{Container, IoHandle, IoMode, DEFAULT_READ_CAP};

/// Disk-backed container on a caller-chosen path.
///
/// The default file container: data lives at `path`, nowhere else. The
/// open handle is cached per mode and dropped on `clear` or when the
/// container goes away.
pub struct SingleFile {
    path: PathBuf,
    handle: Option<(IoMode, File)>,
    filled: bool,
    cap: u64,
}

impl SingleFile {
    /// Container on `path` as given.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
            filled: false,
            cap: DEFAULT_READ_CAP,
        }
    }

    /// Container on the canonical form of `path`.
    ///
    /// The path is resolved at construction; a missing file resolves
    /// against its parent directory so that a later `get` may create it.
    pub fn canonical(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let resolved = match path.canonicalize() {
            Ok(p) => p,
            Err(_) => {
                let parent = path.parent().unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .ok_or_else(|| ContainerError::Void(path.display().to_string()))?;
                parent.canonicalize()?.join(name)
            }
        };
        Ok(Self::new(resolved))
    }

    /// Override the whole-content read cap.
    pub fn with_read_cap(mut self, cap: u64) -> Self {
        self.cap = cap;
        self
    }

    /// The backing path, without forcing the file into existence.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self, mode: IoMode) -> ContainerResult<File> {
        let file = match mode {
            IoMode::Read => OpenOptions::new().read(true).open(&self.path)?,
            IoMode::Write => OpenOptions::new()
                .create(true)
                .truncate(true)
                .read(true)
                .write(true)
                .open(&self.path)?,
            IoMode::Append => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        };
        Ok(file)
    }
}

impl Container for SingleFile {
    fn local_path(&mut self) -> ContainerResult<PathBuf> {
        Ok(self.path.clone())
    }

    fn io_handle(&mut self, mode: IoMode) -> ContainerResult<&mut dyn IoHandle> {
        let reopen = match &self.handle {
            Some((held, _)) => *held != mode,
            None => true,
        };
        if reopen {
            // Drop the previous handle first so truncation happens on a
            // closed file.
            self.handle = None;
            let file = self.open(mode)?;
            self.handle = Some((mode, file));
        }
        let (_, file) = self.handle.as_mut().expect("handle was just set");
        Ok(file)
    }

    fn write(&mut self, data: &[u8]) -> ContainerResult<()> {
        self.handle = None;
        fs::write(&self.path, data)?;
        self.filled = true;
        Ok(())
    }

    fn clear(&mut self) -> ContainerResult<()> {
        self.handle = None;
        if self.path.exists() {
            debug!(path = %self.path.display(), "removing file container");
            fs::remove_file(&self.path)?;
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
            self.handle = None;
        }
    }

    fn read_cap(&self) -> u64 {
        self.cap
    }
}

impl std::fmt::Debug for SingleFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFile")
            .field("path", &self.path)
            .field("filled", &self.filled)
            .finish()
    }
}
