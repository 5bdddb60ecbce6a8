use serde::{Deserialize, Serialize};
use std::fmt;

/// On-disk format of a partition, as far as boot code installation cares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FilesystemKind {
    Fat32,
    Hfs,
    ExFat,
    Unknown,
}

impl FilesystemKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilesystemKind::Fat32 => "FAT32",
            FilesystemKind::Hfs => "HFS",
            FilesystemKind::ExFat => "EXFAT",
            FilesystemKind::Unknown => "unknown",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, FilesystemKind::Unknown)
    }
}

impl fmt::Display for FilesystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
