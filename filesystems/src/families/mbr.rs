// Master boot record - boot code in front, partition table and signature kept

use super::{check_len, BootRecordLayout};
use crate::sector::SectorBuffer;
use dueti_core::DuetiError;
use log::warn;

pub const MBR_SIZE: usize = 512;
/// Bytes of boot code before the disk signature
pub const BOOT_CODE_LEN: usize = 440;
const PARTITION_TABLE_OFFSET: usize = 446;
const PARTITION_ENTRY_SIZE: usize = 16;

pub struct MasterBootRecord;

impl BootRecordLayout for MasterBootRecord {
    const SOURCE_LEN: usize = BOOT_CODE_LEN;
    const DESTINATION_LEN: usize = MBR_SIZE;

    fn merge(source: &[u8], destination: &[u8]) -> Result<SectorBuffer, DuetiError> {
        check_len("MBR boot code", source, Self::SOURCE_LEN)?;
        check_len("MBR sector", destination, Self::DESTINATION_LEN)?;
        inspect_destination(destination);

        Ok(SectorBuffer::from_parts(
            &[source, &destination[BOOT_CODE_LEN..]],
            MBR_SIZE,
        ))
    }
}

/// Warn about destinations that don't look like a partitioned disk.
/// Whatever is there is preserved either way.
fn inspect_destination(mbr: &[u8]) {
    if mbr[510] != 0x55 || mbr[511] != 0xAA {
        warn!(
            "destination MBR signature is {:02X}{:02X} (should be 55AA)",
            mbr[510], mbr[511]
        );
    }

    let has_partitions = (0..4).any(|i| {
        let entry = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
        mbr[entry + 4] != 0
    });
    if !has_partitions {
        warn!("no partitions found in destination MBR");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_code_replaced_partition_table_kept() {
        let source: Vec<u8> = (0..440).map(|i| (i % 251) as u8).collect();
        let mut destination = vec![0xEEu8; 512];
        destination[440..444].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        destination[446 + 4] = 0x0C;
        destination[510] = 0x55;
        destination[511] = 0xAA;

        let merged = MasterBootRecord::merge(&source, &destination).unwrap();
        let bytes = merged.as_bytes();

        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[..440], &source[..]);
        assert_eq!(&bytes[440..], &destination[440..]);
    }

    #[test]
    fn blank_destination_still_merges() {
        let merged = MasterBootRecord::merge(&[0x90u8; 440], &[0u8; 512]).unwrap();
        assert_eq!(&merged.as_bytes()[..440], &[0x90u8; 440][..]);
        assert_eq!(&merged.as_bytes()[440..], &[0u8; 72][..]);
    }

    #[test]
    fn wrong_lengths_rejected() {
        assert!(MasterBootRecord::merge(&[0u8; 439], &[0u8; 512]).is_err());
        assert!(MasterBootRecord::merge(&[0u8; 440], &[0u8; 511]).is_err());
    }
}
