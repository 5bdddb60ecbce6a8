// HFS boot blocks - the first two sectors are replaced as a whole

use super::{check_len, BootRecordLayout};
use crate::detection::FilesystemDetector;
use crate::sector::SectorBuffer;
use dueti_core::{DuetiError, FilesystemKind};

/// Boot blocks in front of the volume header at offset 1024
pub const BOOT_BLOCKS_LEN: usize = 1024;

/// HFS boot blocks are addressed in 512-byte sectors
pub const SECTOR_SIZE: usize = 512;

pub struct HfsDetector;

impl FilesystemDetector for HfsDetector {
    const MARKER: &'static [u8] = b"HFS";
    const KIND: FilesystemKind = FilesystemKind::Hfs;
}

pub struct HfsBootBlocks;

impl BootRecordLayout for HfsBootBlocks {
    const SOURCE_LEN: usize = BOOT_BLOCKS_LEN;
    const DESTINATION_LEN: usize = 0;

    fn merge(source: &[u8], _destination: &[u8]) -> Result<SectorBuffer, DuetiError> {
        check_len("HFS boot blocks", source, Self::SOURCE_LEN)?;
        Ok(SectorBuffer::new(source.to_vec(), SECTOR_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_copied_verbatim() {
        let source: Vec<u8> = (0..1024).map(|i| (i * 7 % 256) as u8).collect();
        let merged = HfsBootBlocks::merge(&source, &[0xFFu8; 1536]).unwrap();
        assert_eq!(merged.as_bytes(), &source[..]);
        assert_eq!(merged.sector_size(), SECTOR_SIZE);
        assert_eq!(merged.len(), 2 * SECTOR_SIZE);
    }
}
