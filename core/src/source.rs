// Boot file resolution - the only view the installer has of downloads and archives

use crate::DuetiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Boot code and bootloader files already present on local disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootFiles {
    pub mbr_source: Option<PathBuf>,
    pub pbr_source: Option<PathBuf>,
    pub copy_sources: Vec<PathBuf>,
}

impl BootFiles {
    pub fn is_empty(&self) -> bool {
        self.mbr_source.is_none() && self.pbr_source.is_none() && self.copy_sources.is_empty()
    }
}

/// Anything able to hand over resolved local paths: a downloader, an
/// archive extractor, or plain command line arguments.
pub trait BootFileResolver {
    fn resolve(&self) -> Result<BootFiles, DuetiError>;
}
