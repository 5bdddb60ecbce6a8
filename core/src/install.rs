use crate::FilesystemKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which boot record an installation patches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstallTarget {
    /// Master boot record of a whole disk
    Mbr,
    /// Partition boot record, layout depends on the filesystem
    Pbr,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallOptions {
    /// Assemble everything but leave the destination untouched
    pub dry_run: bool,
    /// Read the written range back and compare it with what was assembled
    pub verify_after_write: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub target: InstallTarget,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub filesystem: Option<FilesystemKind>,
    /// Size of the assembled sector buffer
    pub buffer_len: usize,
    pub bytes_written: usize,
    pub checksum: Option<u32>,
    pub dry_run: bool,
    pub verified: bool,
}
