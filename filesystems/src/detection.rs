// Filesystem detection trait and utilities

use crate::block_io::{AccessMode, BlockDevice};
use crate::families::exfat::ExFatDetector;
use crate::families::fat32::Fat32Detector;
use crate::families::hfs::HfsDetector;
use dueti_core::{DuetiError, FilesystemKind};
use log::debug;
use std::path::Path;

/// Number of bytes inspected at the start of a partition
pub const DETECTION_HEADER_LEN: usize = 1536;

/// Trait for filesystem-specific detection logic
pub trait FilesystemDetector {
    /// ASCII marker that identifies the filesystem somewhere in the header
    const MARKER: &'static [u8];
    const KIND: FilesystemKind;

    /// Check if the partition header carries this filesystem's marker
    fn detect(header: &[u8]) -> Option<FilesystemKind> {
        if contains_marker(header, Self::MARKER) {
            Some(Self::KIND)
        } else {
            None
        }
    }
}

fn contains_marker(header: &[u8], marker: &[u8]) -> bool {
    !marker.is_empty() && header.windows(marker.len()).any(|window| window == marker)
}

/// Classify a partition header. The first matching detector wins.
pub fn classify(header: &[u8]) -> FilesystemKind {
    Fat32Detector::detect(header)
        .or_else(|| HfsDetector::detect(header))
        .or_else(|| ExFatDetector::detect(header))
        .unwrap_or(FilesystemKind::Unknown)
}

/// Read the partition header and classify it.
///
/// The handle is read-only and released before this returns, so nothing
/// has been written when the caller sees `Unknown`.
pub fn detect_filesystem(partition: impl AsRef<Path>) -> Result<FilesystemKind, DuetiError> {
    let partition = partition.as_ref();
    debug!("checking filesystem on {}", partition.display());

    let mut device = BlockDevice::open(partition, AccessMode::ReadOnly)?;
    let header = device.read(DETECTION_HEADER_LEN)?;
    device.close();

    let kind = classify(&header);
    debug!("{}: {}", partition.display(), kind);
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(marker: &[u8], offset: usize) -> Vec<u8> {
        let mut header = vec![0u8; DETECTION_HEADER_LEN];
        header[offset..offset + marker.len()].copy_from_slice(marker);
        header
    }

    #[test]
    fn all_zero_header_is_unknown() {
        assert_eq!(classify(&[0u8; DETECTION_HEADER_LEN]), FilesystemKind::Unknown);
    }

    #[test]
    fn fat32_marker_at_bpb_offset() {
        assert_eq!(classify(&header_with(b"FAT32   ", 0x52)), FilesystemKind::Fat32);
    }

    #[test]
    fn markers_are_found_anywhere_in_header() {
        assert_eq!(classify(&header_with(b"FAT32", 1531)), FilesystemKind::Fat32);
        assert_eq!(classify(&header_with(b"HFS", 1100)), FilesystemKind::Hfs);
        assert_eq!(classify(&header_with(b"EXFAT   ", 3)), FilesystemKind::ExFat);
    }

    #[test]
    fn fat32_wins_over_later_markers() {
        let mut header = header_with(b"EXFAT", 3);
        header[600..603].copy_from_slice(b"HFS");
        header[1200..1205].copy_from_slice(b"FAT32");
        assert_eq!(classify(&header), FilesystemKind::Fat32);

        let mut header = header_with(b"EXFAT", 3);
        header[600..603].copy_from_slice(b"HFS");
        assert_eq!(classify(&header), FilesystemKind::Hfs);
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(classify(&header_with(b"fat32", 82)), FilesystemKind::Unknown);
        assert_eq!(classify(&header_with(b"ExFat", 3)), FilesystemKind::Unknown);
    }

    #[test]
    fn detect_reads_header_from_image() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), header_with(b"HFS", 1024)).unwrap();
        assert_eq!(detect_filesystem(file.path()).unwrap(), FilesystemKind::Hfs);
    }

    #[test]
    fn detect_on_tiny_image_is_short_read() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"FAT32").unwrap();
        let err = detect_filesystem(file.path()).unwrap_err();
        assert!(matches!(err, DuetiError::ShortRead { .. }));
    }
}
