// Boot files found by name inside a release archive that is already extracted

use dueti_core::{BootFileResolver, BootFiles, DuetiError, FilesystemKind};
use log::{debug, info};
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MBR_PATTERN: &str = r"(boot0(md)?|Mbr.com|grldr.mbr)$";
pub const DEFAULT_PBR_PATTERN: &str = r"(boot1f32(alt)?|bs32.com)$";
pub const HFS_PBR_PATTERN: &str = r"boot1h2?$";
pub const EXFAT_PBR_PATTERN: &str = r"boot1x(alt)?$";
pub const DEFAULT_COPY_PATTERN: &str =
    r"(boot(6|7|X64)|Efildr20|grldr|menu.lst|/EFI/|/Refind/|RefindPlus.REL.efi|Sample.plist)$";
/// IA32 `EFI/` trees are never copied by the default pattern
pub const DEFAULT_COPY_EXCLUDE: &str = r"32/EFI/$";

/// PBR boot code name for the filesystem found on the partition
pub fn default_pbr_pattern(kind: FilesystemKind) -> &'static str {
    match kind {
        FilesystemKind::Hfs => HFS_PBR_PATTERN,
        FilesystemKind::ExFat => EXFAT_PBR_PATTERN,
        FilesystemKind::Fat32 | FilesystemKind::Unknown => DEFAULT_PBR_PATTERN,
    }
}

fn compile(pattern: &str) -> Result<Regex, DuetiError> {
    Regex::new(pattern)
        .map_err(|e| DuetiError::Configuration(format!("invalid pattern '{}': {}", pattern, e)))
}

/// Name patterns matched against `/`-separated paths relative to the search
/// root. Directories carry a trailing `/`.
#[derive(Debug)]
pub struct SearchPatterns {
    mbr: Regex,
    pbr: Regex,
    copy: Regex,
    copy_exclude: Option<Regex>,
}

impl SearchPatterns {
    /// Build patterns from optional overrides. Without a PBR override the
    /// partition's filesystem picks the boot code name.
    pub fn new(
        mbr: Option<&str>,
        pbr: Option<&str>,
        copy: Option<&str>,
        filesystem: Option<FilesystemKind>,
    ) -> Result<Self, DuetiError> {
        let pbr_default = filesystem.map_or(DEFAULT_PBR_PATTERN, default_pbr_pattern);
        let copy_exclude = match copy {
            Some(_) => None,
            None => Some(compile(DEFAULT_COPY_EXCLUDE)?),
        };

        Ok(Self {
            mbr: compile(mbr.unwrap_or(DEFAULT_MBR_PATTERN))?,
            pbr: compile(pbr.unwrap_or(pbr_default))?,
            copy: compile(copy.unwrap_or(DEFAULT_COPY_PATTERN))?,
            copy_exclude,
        })
    }

    fn is_copy(&self, name: &str) -> bool {
        self.copy.is_match(name) && !self.copy_exclude.as_ref().is_some_and(|re| re.is_match(name))
    }
}

/// Searches a directory tree for MBR/PBR boot code and bootloader files.
pub struct ExtractedTree {
    root: PathBuf,
    patterns: SearchPatterns,
}

impl ExtractedTree {
    pub fn new(root: impl Into<PathBuf>, patterns: SearchPatterns) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    fn walk(&self, dir: &Path, prefix: &str, files: &mut BootFiles) -> Result<(), DuetiError> {
        let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let is_dir = entry.file_type()?.is_dir();
            let mut name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
            if is_dir {
                name.push('/');
            }

            if !is_dir && self.patterns.mbr.is_match(&name) {
                if files.mbr_source.is_none() {
                    info!("found mbr chainloader at {}", name);
                    files.mbr_source = Some(path);
                } else {
                    debug!("ignoring further mbr candidate {}", name);
                }
            } else if !is_dir && self.patterns.pbr.is_match(&name) {
                if files.pbr_source.is_none() {
                    info!("found pbr chainloader at {}", name);
                    files.pbr_source = Some(path);
                } else {
                    debug!("ignoring further pbr candidate {}", name);
                }
            } else if self.patterns.is_copy(&name) {
                info!("found bootloader file(s) at {}", name);
                files.copy_sources.push(path);
            } else if is_dir {
                // A matched directory is copied whole, so only unmatched ones are entered
                self.walk(&path, &name, files)?;
            }
        }
        Ok(())
    }
}

impl BootFileResolver for ExtractedTree {
    fn resolve(&self) -> Result<BootFiles, DuetiError> {
        debug!("searching {}", self.root.display());
        let mut files = BootFiles::default();
        self.walk(&self.root, "", &mut files)?;

        if files.is_empty() {
            return Err(DuetiError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("DUET files not found in {}", self.root.display()),
            )));
        }
        Ok(files)
    }
}

/// Where a loader release is published. Fetching is left to the user;
/// the extracted archive is searched with [`ExtractedTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// GitHub repository in `author/name` form, searched release by release
    GitHub(String),
    /// Direct archive URL
    Archive(String),
}

impl DownloadSource {
    pub fn location(&self) -> String {
        match self {
            DownloadSource::GitHub(repo) => format!("https://github.com/{}/releases", repo),
            DownloadSource::Archive(url) => url.clone(),
        }
    }
}

impl fmt::Display for DownloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}

impl FromStr for DownloadSource {
    type Err = DuetiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let github = |repo: &str| DownloadSource::GitHub(repo.to_string());
        let archive = |name: &str| {
            DownloadSource::Archive(format!(
                "https://github.com/sugoidogo/DUETi/releases/download/v0/{}",
                name
            ))
        };
        let is_repo = |s: &str| {
            matches!(s.split('/').collect::<Vec<_>>()[..], [author, name] if !author.is_empty() && !name.is_empty())
        };

        match s {
            "clover" => Ok(github("CloverHackyColor/CloverBootloader")),
            "opencore" => Ok(github("acidanthera/OpenCorePkg")),
            "refindplus" => Ok(github("dakanji/RefindPlus")),
            "edk2015" => Ok(archive("DUET_EDK2015_REFIND.zip")),
            "edk2020" => Ok(archive("DUET_EDK2020_REFIND.zip")),
            "grub4dos" => Ok(archive("grub4dos.zip")),
            url if url.starts_with("http") => Ok(DownloadSource::Archive(url.to_string())),
            repo if is_repo(repo) => Ok(github(repo)),
            other => Err(DuetiError::InvalidInput(format!(
                "unknown download source '{}': use a preset, an author/name repository or a URL",
                other
            ))),
        }
    }
}
