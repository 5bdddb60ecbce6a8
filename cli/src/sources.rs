// Boot files named directly on the command line

use dueti_core::{BootFileResolver, BootFiles, DuetiError};
use log::debug;
use std::io;
use std::path::{Path, PathBuf};

pub struct CommandLineFiles {
    pub mbr_source: Option<PathBuf>,
    pub pbr_source: Option<PathBuf>,
    pub copy_sources: Vec<PathBuf>,
}

fn require_file(path: &Path) -> Result<PathBuf, DuetiError> {
    if !path.is_file() {
        return Err(DuetiError::IoError(io::Error::new(
            io::ErrorKind::NotFound,
            format!("boot code not found: {}", path.display()),
        )));
    }
    Ok(path.to_path_buf())
}

impl BootFileResolver for CommandLineFiles {
    fn resolve(&self) -> Result<BootFiles, DuetiError> {
        let files = BootFiles {
            mbr_source: self.mbr_source.as_deref().map(require_file).transpose()?,
            pbr_source: self.pbr_source.as_deref().map(require_file).transpose()?,
            // Missing copy sources are skipped at copy time
            copy_sources: self.copy_sources.clone(),
        };
        debug!("resolved boot files: {:?}", files);
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn resolves_existing_files() {
        let mbr = NamedTempFile::new().unwrap();
        let files = CommandLineFiles {
            mbr_source: Some(mbr.path().to_path_buf()),
            pbr_source: None,
            copy_sources: vec![PathBuf::from("/nonexistent/EFI")],
        }
        .resolve()
        .unwrap();

        assert_eq!(files.mbr_source.as_deref(), Some(mbr.path()));
        assert_eq!(files.pbr_source, None);
        assert_eq!(files.copy_sources.len(), 1);
    }

    #[test]
    fn missing_boot_code_is_io_error() {
        let err = CommandLineFiles {
            mbr_source: None,
            pbr_source: Some(PathBuf::from("/nonexistent/boot1f32")),
            copy_sources: vec![],
        }
        .resolve()
        .unwrap_err();

        assert!(err.is_io());
        assert!(err.to_string().contains("boot1f32"));
    }
}
