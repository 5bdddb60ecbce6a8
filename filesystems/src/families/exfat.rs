// exFAT main boot region
//
// Sector 0 mixes loader code with the volume parameters kept from the
// device. Sectors 1-10 are carried over untouched so the boot checksum
// can be recomputed over all eleven sectors; the checksum sector itself
// is appended by the installer.

use super::{check_len, BootRecordLayout};
use crate::block_io::BlockDevice;
use crate::detection::FilesystemDetector;
use crate::sector::SectorBuffer;
use dueti_core::{DuetiError, FilesystemKind};
use log::debug;

pub const BOOT_SECTOR_LEN: usize = 512;
/// Start of the range kept from the destination
pub const PRESERVED_START: usize = 120;
/// End of the range kept from the destination
pub const PRESERVED_END: usize = 390;
/// BytesPerSectorShift field of the boot sector
pub const SECTOR_SHIFT_OFFSET: usize = 108;
pub const MIN_SECTOR_SHIFT: u8 = 9;
pub const MAX_SECTOR_SHIFT: u8 = 12;
/// Sectors covered by the boot checksum; the checksum sector follows them
pub const BOOT_REGION_SECTORS: usize = 11;

pub struct ExFatDetector;

impl FilesystemDetector for ExFatDetector {
    const MARKER: &'static [u8] = b"EXFAT";
    const KIND: FilesystemKind = FilesystemKind::ExFat;
}

pub struct ExFatBootSector;

impl BootRecordLayout for ExFatBootSector {
    const SOURCE_LEN: usize = BOOT_SECTOR_LEN;
    const DESTINATION_LEN: usize = BOOT_SECTOR_LEN;

    fn merge(source: &[u8], destination: &[u8]) -> Result<SectorBuffer, DuetiError> {
        check_len("exFAT boot code", source, Self::SOURCE_LEN)?;
        check_len("exFAT boot sector", destination, Self::DESTINATION_LEN)?;

        let bytes = [
            &source[..PRESERVED_START],
            &destination[PRESERVED_START..PRESERVED_END],
            &source[PRESERVED_END..],
        ]
        .concat();
        let sector_size = sector_size(sector_shift(&bytes)?);

        Ok(SectorBuffer::new(bytes, sector_size))
    }
}

/// BytesPerSectorShift of an assembled boot sector, limited to 512..4096 byte sectors.
pub fn sector_shift(boot_sector: &[u8]) -> Result<u8, DuetiError> {
    let shift = *boot_sector.get(SECTOR_SHIFT_OFFSET).ok_or_else(|| {
        DuetiError::InvalidBootRegion("boot sector too short for BytesPerSectorShift".to_string())
    })?;

    if !(MIN_SECTOR_SHIFT..=MAX_SECTOR_SHIFT).contains(&shift) {
        return Err(DuetiError::InvalidBootRegion(format!(
            "invalid sector shift: {} (must be {}..={})",
            shift, MIN_SECTOR_SHIFT, MAX_SECTOR_SHIFT
        )));
    }
    Ok(shift)
}

pub fn sector_size(shift: u8) -> usize {
    1usize << shift
}

/// Bytes covered by the boot checksum
pub fn boot_region_len(shift: u8) -> usize {
    sector_size(shift) * BOOT_REGION_SECTORS
}

/// Extend an assembled sector 0 with the rest of the boot region from the device.
pub fn read_boot_region(
    sector0: SectorBuffer,
    destination: &mut BlockDevice,
) -> Result<SectorBuffer, DuetiError> {
    let shift = sector_shift(sector0.as_bytes())?;
    let region_len = boot_region_len(shift);
    debug!(
        "exFAT sector size {} bytes, boot region {} bytes",
        sector_size(shift),
        region_len
    );

    let rest = destination.read_at(BOOT_SECTOR_LEN as u64, region_len - BOOT_SECTOR_LEN)?;
    let mut region = sector0;
    region.append(&rest);
    Ok(region)
}
