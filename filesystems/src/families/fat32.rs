// FAT32 partition boot record - jump and boot code from the loader, BPB from the volume

use super::{check_len, BootRecordLayout};
use crate::detection::FilesystemDetector;
use crate::sector::SectorBuffer;
use dueti_core::{DuetiError, FilesystemKind};

pub const SECTOR_SIZE: usize = 512;
/// Jump instruction at the start of the sector
pub const JUMP_LEN: usize = 3;
/// End of the BIOS Parameter Block (OEM name, BPB, extended BPB)
pub const BPB_END: usize = 90;

pub struct Fat32Detector;

impl FilesystemDetector for Fat32Detector {
    const MARKER: &'static [u8] = b"FAT32";
    const KIND: FilesystemKind = FilesystemKind::Fat32;
}

pub struct Fat32BootSector;

impl BootRecordLayout for Fat32BootSector {
    const SOURCE_LEN: usize = SECTOR_SIZE;
    const DESTINATION_LEN: usize = SECTOR_SIZE;

    fn merge(source: &[u8], destination: &[u8]) -> Result<SectorBuffer, DuetiError> {
        check_len("FAT32 boot code", source, Self::SOURCE_LEN)?;
        check_len("FAT32 boot sector", destination, Self::DESTINATION_LEN)?;

        Ok(SectorBuffer::from_parts(
            &[
                &source[..JUMP_LEN],
                &destination[JUMP_LEN..BPB_END],
                &source[BPB_END..],
            ],
            SECTOR_SIZE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpb_preserved_rest_from_source() {
        let source: Vec<u8> = (0..512).map(|i| (i % 256) as u8).collect();
        let mut destination = vec![0u8; 512];
        destination[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        destination[3..11].copy_from_slice(b"MSWIN4.1");
        destination[0x52..0x57].copy_from_slice(b"FAT32");
        destination[200] = 0x77;

        let merged = Fat32BootSector::merge(&source, &destination).unwrap();
        let bytes = merged.as_bytes();

        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[0..3], &source[0..3]);
        assert_eq!(&bytes[3..90], &destination[3..90]);
        assert_eq!(&bytes[90..512], &source[90..512]);
    }

    #[test]
    fn short_source_rejected() {
        assert!(Fat32BootSector::merge(&[0u8; 425], &[0u8; 512]).is_err());
    }
}
