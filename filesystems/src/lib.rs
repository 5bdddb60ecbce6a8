// Boot sector patching engine
//
// Reads the boot record already on a device, merges in externally built
// boot code according to the device's layout, and writes the result back
// in a single flushed write.

pub mod block_io;
pub mod checksum;
pub mod detection;
pub mod families;
pub mod installer;
pub mod sector;

pub use block_io::{AccessMode, BlockDevice};
pub use checksum::{checksum_sector, compute_boot_checksum, rolling_checksum, EXFAT_EXCLUDED_OFFSETS};
pub use detection::{classify, detect_filesystem, FilesystemDetector, DETECTION_HEADER_LEN};
pub use families::{BootRecordLayout, MergeStrategy};
pub use installer::{BootstrapInstaller, InstallState};
pub use sector::SectorBuffer;
