// Copy bootloader files into place once the boot sectors are written

use dueti_core::DuetiError;
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Renames applied when none are given, covering the common loader layouts
pub const DEFAULT_RENAMES: &[&str] = &[
    "bootX64:boot",
    "boot7:boot",
    "Sample.plist:efi/oc/Sample.plist",
    "Refind:efi/boot",
    "EFI/Drivers:efi/boot/drivers",
    "efi/boot/refind.efi:efi/boot/bootx64.efi",
    "x64_RefindPlus_REL.efi:efi/boot/bootx64.efi",
];

/// `OLDNAME:NEWNAME`, both relative to the copy destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameSpec {
    pub from: String,
    pub to: String,
}

impl FromStr for RenameSpec {
    type Err = DuetiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(':').collect::<Vec<_>>()[..] {
            [from, to] if !from.is_empty() && !to.is_empty() => Ok(Self {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(DuetiError::InvalidInput(format!(
                "rename must be OLDNAME:NEWNAME, got '{}'",
                s
            ))),
        }
    }
}

pub fn default_renames() -> Vec<RenameSpec> {
    DEFAULT_RENAMES
        .iter()
        .filter_map(|spec| spec.parse().ok())
        .collect()
}

/// Copy each source into `dest/<basename>`. Directories are merged into
/// whatever is already there; missing sources are skipped.
pub fn copy_sources<P: AsRef<Path>>(sources: &[P], dest: &Path) -> Result<(), DuetiError> {
    for source in sources {
        let source = source.as_ref();
        let Some(basename) = source.file_name() else {
            debug!("no file name in {}, skipping copy", source.display());
            continue;
        };
        let target = dest.join(basename);

        if source.is_dir() {
            copy_tree(source, &target)?;
        } else if source.is_file() {
            fs::create_dir_all(dest)?;
            fs::copy(source, &target)?;
        } else {
            debug!("file not found, skipping copy of {}", source.display());
            continue;
        }
        info!("copied {} to {}", source.display(), target.display());
    }
    Ok(())
}

/// Move `dest/from` to `dest/to` for each rename. Directories are merged
/// and the old tree removed; missing names are skipped.
pub fn apply_renames(dest: &Path, renames: &[RenameSpec]) -> Result<(), DuetiError> {
    for rename in renames {
        let from = dest.join(&rename.from);
        let to = dest.join(&rename.to);

        if from.is_dir() {
            move_tree(&from, &to)?;
        } else if from.is_file() {
            move_file(&from, &to)?;
        } else {
            debug!("file not found, skipping rename of {}", rename.from);
            continue;
        }
        info!("moved {} to {}", rename.from, rename.to);
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), DuetiError> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn move_tree(from: &Path, to: &Path) -> Result<(), DuetiError> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            move_tree(&entry.path(), &target)?;
        } else {
            move_file(&entry.path(), &target)?;
        }
    }
    // On case-insensitive filesystems `to` may be `from` under another name
    if from.exists() && fs::canonicalize(from)? != fs::canonicalize(to)? {
        fs::remove_dir_all(from)?;
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<(), DuetiError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_err() {
        // Cross-device moves fall back to copy and delete
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rename_spec_parsing() {
        let spec: RenameSpec = "EFI/Drivers:efi/boot/drivers".parse().unwrap();
        assert_eq!(spec.from, "EFI/Drivers");
        assert_eq!(spec.to, "efi/boot/drivers");

        assert!("no-colon".parse::<RenameSpec>().is_err());
        assert!("a:b:c".parse::<RenameSpec>().is_err());
        assert!(":b".parse::<RenameSpec>().is_err());
    }

    #[test]
    fn default_renames_all_parse() {
        assert_eq!(default_renames().len(), DEFAULT_RENAMES.len());
    }

    #[test]
    fn copies_files_and_merges_directories() {
        let work = tempdir().unwrap();
        let extracted = work.path().join("extracted");
        fs::create_dir_all(extracted.join("EFI/BOOT")).unwrap();
        fs::write(extracted.join("EFI/BOOT/BOOTX64.efi"), b"efi").unwrap();
        fs::write(extracted.join("boot7"), b"loader").unwrap();

        let dest = work.path().join("esp");
        fs::create_dir_all(dest.join("EFI/OC")).unwrap();
        fs::write(dest.join("EFI/OC/config.plist"), b"keep").unwrap();

        copy_sources(
            &[
                extracted.join("EFI/"),
                extracted.join("boot7"),
                extracted.join("missing"),
            ],
            &dest,
        )
        .unwrap();

        assert_eq!(fs::read(dest.join("EFI/BOOT/BOOTX64.efi")).unwrap(), b"efi");
        assert_eq!(fs::read(dest.join("EFI/OC/config.plist")).unwrap(), b"keep");
        assert_eq!(fs::read(dest.join("boot7")).unwrap(), b"loader");
        assert!(extracted.join("boot7").exists());
    }

    #[test]
    fn renames_files_and_directories() {
        let dest = tempdir().unwrap();
        fs::write(dest.path().join("boot7"), b"loader").unwrap();
        fs::create_dir_all(dest.path().join("Refind/drivers")).unwrap();
        fs::write(dest.path().join("Refind/refind.efi"), b"refind").unwrap();
        fs::write(dest.path().join("Refind/drivers/ext4.efi"), b"drv").unwrap();

        let renames: Vec<RenameSpec> = ["boot7:boot", "Refind:efi/boot", "gone:elsewhere"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        apply_renames(dest.path(), &renames).unwrap();

        assert_eq!(fs::read(dest.path().join("boot")).unwrap(), b"loader");
        assert!(!dest.path().join("boot7").exists());
        assert_eq!(
            fs::read(dest.path().join("efi/boot/refind.efi")).unwrap(),
            b"refind"
        );
        assert_eq!(
            fs::read(dest.path().join("efi/boot/drivers/ext4.efi")).unwrap(),
            b"drv"
        );
        assert!(!dest.path().join("Refind").exists());
        assert!(!dest.path().join("elsewhere").exists());
    }

    #[test]
    fn rename_creates_missing_parents() {
        let dest = tempdir().unwrap();
        fs::write(dest.path().join("Sample.plist"), b"plist").unwrap();

        let rename: RenameSpec = "Sample.plist:efi/oc/Sample.plist".parse().unwrap();
        apply_renames(dest.path(), &[rename]).unwrap();

        assert_eq!(
            fs::read(dest.path().join("efi/oc/Sample.plist")).unwrap(),
            b"plist"
        );
    }
}
