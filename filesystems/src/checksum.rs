// exFAT boot region checksum

use byteorder::{ByteOrder, LittleEndian};
use dueti_core::DuetiError;

use crate::families::exfat::{boot_region_len, sector_size};

/// VolumeFlags (106-107) and PercentInUse (112) change at runtime and are skipped
pub const EXFAT_EXCLUDED_OFFSETS: [usize; 3] = [106, 107, 112];

/// Rotate-right-by-one-and-add checksum over `region`, skipping the
/// absolute indices in `excluded`.
pub fn rolling_checksum(region: &[u8], excluded: &[usize]) -> u32 {
    region
        .iter()
        .enumerate()
        .filter(|(index, _)| !excluded.contains(index))
        .fold(0u32, |checksum, (_, &byte)| {
            checksum.rotate_right(1).wrapping_add(byte as u32)
        })
}

/// Boot checksum over the first eleven sectors of `region`.
pub fn compute_boot_checksum(region: &[u8], sector_shift: u8) -> Result<u32, DuetiError> {
    let len = boot_region_len(sector_shift);
    if region.len() < len {
        return Err(DuetiError::InvalidBootRegion(format!(
            "checksum needs {} bytes, region has {}",
            len,
            region.len()
        )));
    }
    Ok(rolling_checksum(&region[..len], &EXFAT_EXCLUDED_OFFSETS))
}

/// One sector filled with the little-endian checksum, repeated.
pub fn checksum_sector(checksum: u32, sector_shift: u8) -> Vec<u8> {
    let mut packed = [0u8; 4];
    LittleEndian::write_u32(&mut packed, checksum);
    packed
        .iter()
        .copied()
        .cycle()
        .take(sector_size(sector_shift))
        .collect()
}
