// Boot record layouts
// Each family decides which bytes come from the boot code and which stay on the device

pub mod exfat;
pub mod fat32;
pub mod hfs;
pub mod mbr;

use crate::block_io::BlockDevice;
use crate::sector::SectorBuffer;
use dueti_core::{DuetiError, FilesystemKind};

/// Fixed-size merge of boot code with an existing boot record
pub trait BootRecordLayout {
    /// Bytes read from the start of the boot code file
    const SOURCE_LEN: usize;
    /// Bytes read from the start of the destination before merging
    const DESTINATION_LEN: usize;

    /// Build the sector buffer from both sides. Pure, no I/O.
    fn merge(source: &[u8], destination: &[u8]) -> Result<SectorBuffer, DuetiError>;
}

/// Reject slices that don't match a layout's fixed lengths.
pub(crate) fn check_len(what: &str, bytes: &[u8], expected: usize) -> Result<(), DuetiError> {
    if bytes.len() != expected {
        return Err(DuetiError::InvalidInput(format!(
            "{} must be {} bytes, got {}",
            what,
            expected,
            bytes.len()
        )));
    }
    Ok(())
}

/// Read both sides at their fixed lengths, then merge.
fn read_and_merge<L: BootRecordLayout>(
    source: &mut BlockDevice,
    destination: &mut BlockDevice,
) -> Result<SectorBuffer, DuetiError> {
    let boot_code = source.read_at(0, L::SOURCE_LEN)?;
    let existing = if L::DESTINATION_LEN > 0 {
        destination.read_at(0, L::DESTINATION_LEN)?
    } else {
        Vec::new()
    };
    L::merge(&boot_code, &existing)
}

/// Merge rule selected for a single installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Mbr,
    Fat32,
    Hfs,
    ExFat,
}

impl MergeStrategy {
    /// Partition boot record strategy for a detected filesystem
    pub fn for_filesystem(kind: FilesystemKind) -> Option<Self> {
        match kind {
            FilesystemKind::Fat32 => Some(MergeStrategy::Fat32),
            FilesystemKind::Hfs => Some(MergeStrategy::Hfs),
            FilesystemKind::ExFat => Some(MergeStrategy::ExFat),
            FilesystemKind::Unknown => None,
        }
    }

    pub fn requires_checksum(&self) -> bool {
        matches!(self, MergeStrategy::ExFat)
    }

    /// Read what the layout needs from both handles and assemble the buffer.
    ///
    /// Only reads. For exFAT the result is the whole boot region without
    /// its checksum sector.
    pub fn assemble(
        &self,
        source: &mut BlockDevice,
        destination: &mut BlockDevice,
    ) -> Result<SectorBuffer, DuetiError> {
        match self {
            MergeStrategy::Mbr => read_and_merge::<mbr::MasterBootRecord>(source, destination),
            MergeStrategy::Fat32 => read_and_merge::<fat32::Fat32BootSector>(source, destination),
            MergeStrategy::Hfs => read_and_merge::<hfs::HfsBootBlocks>(source, destination),
            MergeStrategy::ExFat => {
                let sector0 = read_and_merge::<exfat::ExFatBootSector>(source, destination)?;
                exfat::read_boot_region(sector0, destination)
            }
        }
    }
}
