// Raw block I/O - unbuffered, fixed-length access to devices, partitions and image files

use dueti_core::DuetiError;
use log::{debug, error};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// An open device handle owned by a single installation step.
///
/// Writable handles that have been written to are synced before the
/// descriptor is released, on every path out of the owning scope. Sync
/// failures at that point are logged, not returned: call [`BlockDevice::flush`]
/// explicitly to observe them.
pub struct BlockDevice {
    path: PathBuf,
    mode: AccessMode,
    file: File,
    position: u64,
    bytes_written: u64,
    dirty: bool,
}

impl BlockDevice {
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self, DuetiError> {
        let path = path.as_ref().to_path_buf();
        debug!("opening {} ({:?})", path.display(), mode);

        let mut options = OpenOptions::new();
        options.read(true);
        if mode == AccessMode::ReadWrite {
            options.write(true);
        }

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::fs::OpenOptionsExt;
            use winapi::um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE};
            options.share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE);
        }

        let file = options.open(&path)?;

        Ok(Self {
            path,
            mode,
            file,
            position: 0,
            bytes_written: 0,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Current byte offset of the cursor
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size of the target in bytes, if the platform reports one.
    ///
    /// Regular files report their length. Block devices report their size
    /// through an end seek; character devices and some raw device nodes
    /// report 0 or refuse the seek, in which case `None` is returned and
    /// the OS write result decides.
    pub fn capacity(&mut self) -> Option<u64> {
        match self.file.metadata() {
            Ok(metadata) if metadata.is_file() => return Some(metadata.len()),
            Ok(_) => {}
            Err(e) => {
                debug!("{}: metadata not available: {}", self.path.display(), e);
                return None;
            }
        }

        let capacity = match self.file.seek(SeekFrom::End(0)) {
            Ok(0) => {
                debug!("{}: device reports no size", self.path.display());
                None
            }
            Ok(end) => Some(end),
            Err(e) => {
                debug!("{}: size not available: {}", self.path.display(), e);
                None
            }
        };
        // Cursor must stay where callers left it
        if self.file.seek(SeekFrom::Start(self.position)).is_err() {
            return None;
        }
        capacity
    }

    /// Total bytes handed to the OS through this handle, flushed or not
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn seek(&mut self, offset: u64) -> Result<(), DuetiError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Read exactly `len` bytes at the cursor.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>, DuetiError> {
        let offset = self.position;
        let mut buffer = vec![0u8; len];
        let mut filled = 0;

        let result = loop {
            if filled == len {
                break Ok(());
            }
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break Ok(()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        // Bytes already consumed moved the file cursor, error or not
        self.position += filled as u64;
        result?;

        if filled < len {
            return Err(DuetiError::ShortRead {
                path: self.path.clone(),
                offset,
                expected: len,
                actual: filled,
            });
        }

        Ok(buffer)
    }

    /// Read exactly `len` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, DuetiError> {
        self.seek(offset)?;
        self.read(len)
    }

    /// Write all of `bytes` at `offset`. The target is never extended.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<(), DuetiError> {
        if self.mode != AccessMode::ReadWrite {
            return Err(DuetiError::InvalidInput(format!(
                "{} was opened read-only",
                self.path.display()
            )));
        }

        let end = offset + bytes.len() as u64;
        if let Some(capacity) = self.capacity() {
            if end > capacity {
                return Err(DuetiError::ShortWrite {
                    path: self.path.clone(),
                    offset,
                    expected: bytes.len(),
                    capacity,
                });
            }
        }

        self.seek(offset)?;
        let mut written = 0;
        while written < bytes.len() {
            match self.file.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => {
                    written += n;
                    self.bytes_written += n as u64;
                    self.dirty = true;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.position += written as u64;
                    return Err(e.into());
                }
            }
        }
        self.position += written as u64;

        if written < bytes.len() {
            return Err(DuetiError::ShortWrite {
                path: self.path.clone(),
                offset,
                expected: bytes.len(),
                capacity: offset + written as u64,
            });
        }

        debug!("wrote {} bytes to {} at offset {}", written, self.path.display(), offset);
        Ok(())
    }

    /// Force written data to durable storage.
    pub fn flush(&mut self) -> Result<(), DuetiError> {
        if self.mode == AccessMode::ReadWrite {
            self.file.flush()?;
            self.file.sync_all()?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Release the handle. Pending writes are synced, failures only logged.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for BlockDevice {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.file.sync_all() {
                error!("failed to sync {} on close: {}", self.path.display(), e);
            }
        }
        debug!("closed {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn image(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn open_missing_path_is_io_error() {
        let result = BlockDevice::open("/nonexistent/dueti/device", AccessMode::ReadOnly);
        match result {
            Err(e) => assert!(e.is_io()),
            Ok(_) => panic!("opening a missing path must fail"),
        }
    }

    #[test]
    fn reads_are_exact_and_advance_cursor() {
        let data: Vec<u8> = (0..=255u8).collect();
        let file = image(&data);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadOnly).unwrap();

        assert_eq!(device.read(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(device.position(), 3);
        assert_eq!(device.read_at(90, 4).unwrap(), vec![90, 91, 92, 93]);
        assert_eq!(device.position(), 94);
    }

    #[test]
    fn short_read_past_end_fails() {
        let file = image(&[0u8; 100]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadOnly).unwrap();

        match device.read_at(0, 512) {
            Err(DuetiError::ShortRead { expected, actual, .. }) => {
                assert_eq!(expected, 512);
                assert_eq!(actual, 100);
            }
            other => panic!("expected short read, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn write_does_not_extend_target() {
        let file = image(&[0u8; 512]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadWrite).unwrap();

        let result = device.write_at(0, &[0xFFu8; 1024]);
        assert!(matches!(result, Err(DuetiError::ShortWrite { capacity: 512, .. })));
        device.close();

        let contents = std::fs::read(file.path()).unwrap();
        assert_eq!(contents, vec![0u8; 512]);
    }

    #[test]
    fn write_then_flush_persists() {
        let file = image(&[0u8; 1024]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadWrite).unwrap();

        device.write_at(512, &[0xABu8; 16]).unwrap();
        device.flush().unwrap();
        device.close();

        let contents = std::fs::read(file.path()).unwrap();
        assert_eq!(&contents[512..528], &[0xABu8; 16]);
        assert_eq!(contents.len(), 1024);
    }

    #[test]
    fn read_only_handle_refuses_writes() {
        let file = image(&[0u8; 512]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadOnly).unwrap();

        assert!(matches!(
            device.write_at(0, &[1, 2, 3]),
            Err(DuetiError::InvalidInput(_))
        ));
    }

    #[test]
    fn capacity_keeps_cursor() {
        let file = image(&[0u8; 2048]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadOnly).unwrap();

        device.seek(100).unwrap();
        assert_eq!(device.capacity(), Some(2048));
        assert_eq!(device.read(1).unwrap(), vec![0]);
        assert_eq!(device.position(), 101);
    }

    #[test]
    fn short_read_leaves_cursor_after_consumed_bytes() {
        let file = image(&[7u8; 100]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadOnly).unwrap();

        assert!(device.read_at(60, 512).is_err());
        assert_eq!(device.position(), 100);
        device.seek(10).unwrap();
        assert_eq!(device.read(2).unwrap(), vec![7, 7]);
    }

    #[test]
    fn bytes_written_counts_across_flush() {
        let file = image(&[0u8; 1024]);
        let mut device = BlockDevice::open(file.path(), AccessMode::ReadWrite).unwrap();

        assert_eq!(device.bytes_written(), 0);
        device.write_at(0, &[1u8; 512]).unwrap();
        device.flush().unwrap();
        device.write_at(512, &[2u8; 100]).unwrap();
        assert_eq!(device.bytes_written(), 612);
    }

    #[cfg(unix)]
    #[test]
    fn device_node_without_size_accepts_writes() {
        let mut device = BlockDevice::open("/dev/zero", AccessMode::ReadWrite).unwrap();

        assert_eq!(device.capacity(), None);
        device.write_at(0, &[0u8; 512]).unwrap();
        assert_eq!(device.bytes_written(), 512);
    }
}
