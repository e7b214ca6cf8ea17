use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ContainerResult;
use crate::traits::{Container, IoHandle, IoMode, DEFAULT_READ_CAP};

/// Default spool threshold: 64 KiB in memory before rolling to disk.
pub const DEFAULT_SPOOL_LIMIT: u64 = 64 * 1024;

enum Repr {
    Mem(Cursor<Vec<u8>>),
    Disk(NamedTempFile),
}

/// Memory-backed container that spools to a named temp file when the
/// content outgrows a threshold.
///
/// Small payloads never touch the filesystem; anything that needs a real
/// path (`local_path`) or grows past `spool_limit` is transparently
/// materialized on disk. [`InCore::temporize`] and [`InCore::unroll`]
/// convert between the two representations without losing data.
pub struct InCore {
    prefix: String,
    spool_limit: u64,
    cap: u64,
    repr: Repr,
    filled: bool,
}

impl InCore {
    pub fn new() -> Self {
        Self {
            prefix: "stratus.tmp.".to_string(),
            spool_limit: DEFAULT_SPOOL_LIMIT,
            cap: DEFAULT_READ_CAP,
            repr: Repr::Mem(Cursor::new(Vec::new())),
            filled: false,
        }
    }

    /// Temp-file name prefix used once the content spools to disk.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Size above which content moves from memory to disk.
    pub fn with_spool_limit(mut self, limit: u64) -> Self {
        self.spool_limit = limit;
        self
    }

    /// Override the whole-content read cap.
    pub fn with_read_cap(mut self, cap: u64) -> Self {
        self.cap = cap;
        self
    }

    /// Returns `true` while the content still lives in memory.
    pub fn in_memory(&self) -> bool {
        matches!(self.repr, Repr::Mem(_))
    }

    /// Force the content onto a named temp file, preserving bytes and the
    /// current position. No-op when already on disk.
    pub fn temporize(&mut self) -> ContainerResult<()> {
        if let Repr::Mem(cursor) = &mut self.repr {
            let pos = cursor.position();
            let mut file = tempfile::Builder::new().prefix(&self.prefix).tempfile()?;
            file.write_all(cursor.get_ref())?;
            file.seek(SeekFrom::Start(pos))?;
            debug!(path = %file.path().display(), "incore container spooled to disk");
            self.repr = Repr::Disk(file);
        }
        Ok(())
    }

    /// Bring a spooled content back into memory, preserving bytes and the
    /// current position. No-op when already in memory.
    pub fn unroll(&mut self) -> ContainerResult<()> {
        if let Repr::Disk(file) = &mut self.repr {
            let pos = file.stream_position()?;
            file.seek(SeekFrom::Start(0))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            let mut cursor = Cursor::new(buf);
            cursor.set_position(pos);
            self.repr = Repr::Mem(cursor);
        }
        Ok(())
    }

    fn spill_if_needed(&mut self) -> ContainerResult<()> {
        let size = match &self.repr {
            Repr::Mem(cursor) => cursor.get_ref().len() as u64,
            Repr::Disk(_) => return Ok(()),
        };
        if size > self.spool_limit {
            self.temporize()?;
        }
        Ok(())
    }
}

impl Default for InCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for InCore {
    fn local_path(&mut self) -> ContainerResult<PathBuf> {
        self.temporize()?;
        match &self.repr {
            Repr::Disk(file) => Ok(file.path().to_path_buf()),
            Repr::Mem(_) => unreachable!("temporize leaves the container on disk"),
        }
    }

    fn io_handle(&mut self, mode: IoMode) -> ContainerResult<&mut dyn IoHandle> {
        match &mut self.repr {
            Repr::Mem(cursor) => {
                if mode == IoMode::Append {
                    cursor.seek(SeekFrom::End(0))?;
                }
                Ok(cursor)
            }
            Repr::Disk(file) => {
                if mode == IoMode::Append {
                    file.seek(SeekFrom::End(0))?;
                }
                Ok(file)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> ContainerResult<()> {
        self.repr = Repr::Mem(Cursor::new(data.to_vec()));
        self.filled = true;
        self.spill_if_needed()
    }

    fn append(&mut self, data: &[u8]) -> ContainerResult<()> {
        let handle = self.io_handle(IoMode::Append)?;
        handle.write_all(data)?;
        handle.flush()?;
        self.spill_if_needed()
    }

    fn clear(&mut self) -> ContainerResult<()> {
        // Dropping a NamedTempFile removes it from disk.
        self.repr = Repr::Mem(Cursor::new(Vec::new()));
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

impl std::fmt::Debug for InCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InCore")
            .field("in_memory", &self.in_memory())
            .field("spool_limit", &self.spool_limit)
            .field("filled", &self.filled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContainerError;

    #[test]
    fn small_writes_stay_in_memory() {
        let mut c = InCore::new();
        c.write(b"tiny").unwrap();
        assert!(c.in_memory());
        assert_eq!(c.read_all().unwrap(), b"tiny");
    }

    #[test]
    fn spools_above_the_limit() {
        let mut c = InCore::new().with_spool_limit(8);
        c.write(&[0xABu8; 32]).unwrap();
        assert!(!c.in_memory());
        assert_eq!(c.read_all().unwrap(), vec![0xABu8; 32]);
    }

    #[test]
    fn temporize_and_unroll_preserve_content() {
        let mut c = InCore::new();
        c.write(b"keep me intact").unwrap();
        c.temporize().unwrap();
        assert!(!c.in_memory());
        assert_eq!(c.read_all().unwrap(), b"keep me intact");
        c.unroll().unwrap();
        assert!(c.in_memory());
        assert_eq!(c.read_all().unwrap(), b"keep me intact");
    }

    #[test]
    fn local_path_materializes_the_buffer() {
        let mut c = InCore::new();
        c.write(b"on disk now").unwrap();
        let path = c.local_path().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"on disk now");
    }

    #[test]
    fn append_crossing_the_limit_spools() {
        let mut c = InCore::new().with_spool_limit(8);
        c.write(b"1234").unwrap();
        assert!(c.in_memory());
        c.append(b"56789abcdef").unwrap();
        assert!(!c.in_memory());
        assert_eq!(c.read_all().unwrap(), b"123456789abcdef");
    }

    #[test]
    fn oversized_read_fails_closed() {
        let mut c = InCore::new().with_read_cap(4);
        c.write(b"0123456789").unwrap();
        assert!(matches!(
            c.read_all(),
            Err(ContainerError::DataTooLarge { .. })
        ));
    }
}
