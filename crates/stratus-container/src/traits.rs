use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::error::{ContainerError, ContainerResult};

/// Default read cap: 4 MiB, matching the historical "read in one jump"
/// guard of the operational toolbox.
pub const DEFAULT_READ_CAP: u64 = 4 * 1024 * 1024;

/// Access mode requested for a container's I/O handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoMode {
    Read,
    Write,
    Append,
}

/// A seekable byte target. Files, spooled temp files and memory cursors
/// all qualify.
pub trait IoHandle: Read + Write + Seek {}

impl<T: Read + Write + Seek> IoHandle for T {}

/// The local side of a transfer: a byte target a `get` fills and a `put`
/// reads from.
///
/// Invariants shared by all implementations:
/// - `is_filled()` is true only after a successful `write` or after the
///   owner reported a successful fetch via `update_fill(true)`.
/// - Reads larger than `read_cap()` fail with
///   [`ContainerError::DataTooLarge`]; data is never silently truncated.
/// - Backing handles are owned by the container and closed on drop,
///   whatever the exit path.
pub trait Container: Send {
    /// Path of the physical backing target, creating it if needed.
    ///
    /// For virtual containers this forces materialization on disk.
    fn local_path(&mut self) -> ContainerResult<PathBuf>;

    /// An open handle on the backing target in the requested mode.
    fn io_handle(&mut self, mode: IoMode) -> ContainerResult<&mut dyn IoHandle>;

    /// Replace the whole content with `data` and mark the container filled.
    fn write(&mut self, data: &[u8]) -> ContainerResult<()>;

    /// Remove the backing target and reset the filled state.
    fn clear(&mut self) -> ContainerResult<()>;

    /// True once the container holds successfully fetched or written data.
    fn is_filled(&self) -> bool;

    /// Record the outcome of a fetch into this container.
    fn update_fill(&mut self, fetched: bool);

    /// Maximum size accepted by whole-content reads.
    fn read_cap(&self) -> u64 {
        DEFAULT_READ_CAP
    }

    /// Append `data` at the end of the current content.
    fn append(&mut self, data: &[u8]) -> ContainerResult<()> {
        let handle = self.io_handle(IoMode::Append)?;
        handle.write_all(data)?;
        handle.flush()?;
        Ok(())
    }

    /// Total size of the content, leaving the handle rewound.
    fn total_size(&mut self) -> ContainerResult<u64> {
        let handle = self.io_handle(IoMode::Read)?;
        let size = handle.seek(SeekFrom::End(0))?;
        handle.seek(SeekFrom::Start(0))?;
        Ok(size)
    }

    /// Seek the I/O handle back to the start of the content.
    fn rewind(&mut self) -> ContainerResult<()> {
        self.io_handle(IoMode::Read)?.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Read up to `count` bytes from the current position.
    ///
    /// Fails closed when `count` exceeds the read cap.
    fn read(&mut self, count: u64) -> ContainerResult<Vec<u8>> {
        let cap = self.read_cap();
        if count > cap {
            return Err(ContainerError::DataTooLarge { size: count, cap });
        }
        let handle = self.io_handle(IoMode::Read)?;
        let mut buf = vec![0u8; count as usize];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = handle.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Read the whole content in one jump.
    ///
    /// Fails closed with [`ContainerError::DataTooLarge`] when the content
    /// exceeds the read cap.
    fn read_all(&mut self) -> ContainerResult<Vec<u8>> {
        let size = self.total_size()?;
        let cap = self.read_cap();
        if size > cap {
            return Err(ContainerError::DataTooLarge { size, cap });
        }
        let handle = self.io_handle(IoMode::Read)?;
        handle.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(size as usize);
        handle.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
