// Bootstrap installer - detection, merge, checksum and the single destructive write

use crate::block_io::{AccessMode, BlockDevice};
use crate::checksum::{checksum_sector, compute_boot_checksum};
use crate::detection::detect_filesystem;
use crate::families::exfat;
use crate::families::MergeStrategy;
use crate::sector::SectorBuffer;
use dueti_core::{DuetiError, FilesystemKind, InstallOptions, InstallReport, InstallTarget};
use log::{debug, info, warn};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    SourceOpened,
    DestinationClassified,
    Merged,
    ChecksumComputed,
    Written,
    Closed,
    /// Failed before anything reached the destination
    Aborted,
    /// Failed once bytes were handed to the destination; there is no rollback
    WriteFailed,
}

impl InstallState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallState::Closed | InstallState::Aborted | InstallState::WriteFailed
        )
    }
}

/// Performs exactly one MBR or PBR installation.
pub struct BootstrapInstaller {
    options: InstallOptions,
    state: InstallState,
}

impl BootstrapInstaller {
    pub fn new(options: InstallOptions) -> Self {
        Self {
            options,
            state: InstallState::Idle,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Replace the first 440 bytes of a disk, keeping its partition table.
    pub fn install_mbr(
        &mut self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<InstallReport, DuetiError> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        self.begin()?;
        info!("writing {} to {}", source.display(), destination.display());

        let result = self.run(InstallTarget::Mbr, MergeStrategy::Mbr, None, source, destination);
        self.finish(result)
    }

    /// Patch a partition boot record according to the partition's filesystem.
    ///
    /// Fails with [`DuetiError::UnsupportedFilesystem`] before opening
    /// anything for writing when the filesystem can't be recognised.
    pub fn install_pbr(
        &mut self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<InstallReport, DuetiError> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        self.begin()?;

        let result = detect_filesystem(destination).and_then(|kind| {
            self.install_classified(kind, source, destination)
        });
        self.finish(result)
    }

    /// Patch a partition boot record whose filesystem the caller already
    /// detected, so the partition header is not read a second time.
    pub fn install_pbr_classified(
        &mut self,
        kind: FilesystemKind,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<InstallReport, DuetiError> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        self.begin()?;

        let result = self.install_classified(kind, source, destination);
        self.finish(result)
    }

    fn install_classified(
        &mut self,
        kind: FilesystemKind,
        source: &Path,
        destination: &Path,
    ) -> Result<InstallReport, DuetiError> {
        let strategy = self.classify(kind, destination)?;
        info!("writing {} to {}", source.display(), destination.display());
        self.run(InstallTarget::Pbr, strategy, Some(kind), source, destination)
    }

    fn begin(&mut self) -> Result<(), DuetiError> {
        if self.state != InstallState::Idle {
            return Err(DuetiError::InvalidInput(format!(
                "installer already used (state {:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn advance(&mut self, next: InstallState) {
        debug!("install state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish(
        &mut self,
        result: Result<InstallReport, DuetiError>,
    ) -> Result<InstallReport, DuetiError> {
        match &result {
            Ok(_) => self.advance(InstallState::Closed),
            Err(e) => {
                match self.state {
                    state if state.is_terminal() => {}
                    InstallState::Written => self.advance(InstallState::WriteFailed),
                    _ => self.advance(InstallState::Aborted),
                }
                debug!("installation failed in state {:?}: {}", self.state, e);
            }
        }
        result
    }

    fn classify(
        &mut self,
        kind: FilesystemKind,
        destination: &Path,
    ) -> Result<MergeStrategy, DuetiError> {
        let strategy = match MergeStrategy::for_filesystem(kind) {
            Some(strategy) => strategy,
            None => return Err(DuetiError::UnsupportedFilesystem(destination.to_path_buf())),
        };

        match kind {
            FilesystemKind::Fat32 => debug!("FAT32 filesystem detected"),
            _ => warn!("{} filesystem detected - using {:?} boot record layout", kind, strategy),
        }
        self.advance(InstallState::DestinationClassified);
        Ok(strategy)
    }

    fn run(
        &mut self,
        target: InstallTarget,
        strategy: MergeStrategy,
        filesystem: Option<FilesystemKind>,
        source: &Path,
        destination: &Path,
    ) -> Result<InstallReport, DuetiError> {
        let mut source_device = BlockDevice::open(source, AccessMode::ReadOnly)?;
        self.advance(InstallState::SourceOpened);

        let mode = if self.options.dry_run {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        let mut destination_device = BlockDevice::open(destination, mode)?;

        let mut buffer = strategy.assemble(&mut source_device, &mut destination_device)?;
        self.advance(InstallState::Merged);
        source_device.close();

        let checksum = if strategy.requires_checksum() {
            let checksum = append_checksum_sector(&mut buffer)?;
            self.advance(InstallState::ChecksumComputed);
            Some(checksum)
        } else {
            None
        };

        let mut report = InstallReport {
            target,
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            filesystem,
            buffer_len: buffer.len(),
            bytes_written: 0,
            checksum,
            dry_run: self.options.dry_run,
            verified: false,
        };

        if self.options.dry_run {
            info!(
                "dry run: {} bytes not written to {}",
                buffer.len(),
                destination.display()
            );
            return Ok(report);
        }

        let written = destination_device
            .write_at(0, buffer.as_bytes())
            .and_then(|()| destination_device.flush());
        if let Err(e) = written {
            if destination_device.bytes_written() > 0 {
                self.advance(InstallState::WriteFailed);
            }
            return Err(e);
        }
        self.advance(InstallState::Written);
        report.bytes_written = buffer.len();

        if self.options.verify_after_write {
            verify_written(&mut destination_device, &buffer, strategy)?;
            report.verified = true;
        }
        destination_device.close();

        Ok(report)
    }
}

/// Compute the boot checksum of an assembled exFAT region and append its sector.
fn append_checksum_sector(buffer: &mut SectorBuffer) -> Result<u32, DuetiError> {
    let shift = exfat::sector_shift(buffer.as_bytes())?;
    let checksum = compute_boot_checksum(buffer.as_bytes(), shift)?;
    let sector = checksum_sector(checksum, shift);
    debug!(
        "boot checksum 0x{:08X}, sector pattern {}",
        checksum,
        hex::encode(&sector[..4])
    );
    buffer.append(&sector);
    Ok(checksum)
}

fn verify_written(
    destination: &mut BlockDevice,
    buffer: &SectorBuffer,
    strategy: MergeStrategy,
) -> Result<(), DuetiError> {
    let written = destination.read_at(0, buffer.len())?;
    if let Some(offset) = written
        .iter()
        .zip(buffer.as_bytes())
        .position(|(a, b)| a != b)
    {
        return Err(DuetiError::VerificationFailed(format!(
            "{} differs from assembled buffer at offset {}",
            destination.path().display(),
            offset
        )));
    }

    if strategy.requires_checksum() {
        let shift = exfat::sector_shift(&written)?;
        let region_len = exfat::boot_region_len(shift);
        let expected = checksum_sector(compute_boot_checksum(&written, shift)?, shift);
        if written[region_len..] != expected[..] {
            return Err(DuetiError::VerificationFailed(format!(
                "{}: stored boot checksum does not match boot region",
                destination.path().display()
            )));
        }
    }

    info!("verified {} bytes on {}", buffer.len(), destination.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installer_in(state: InstallState) -> BootstrapInstaller {
        let mut installer = BootstrapInstaller::new(InstallOptions::default());
        installer.state = state;
        installer
    }

    #[test]
    fn failure_after_write_is_not_reported_as_aborted() {
        let mut installer = installer_in(InstallState::Written);
        let result = installer.finish(Err(DuetiError::VerificationFailed("mismatch".into())));

        assert!(result.is_err());
        assert_eq!(installer.state(), InstallState::WriteFailed);
    }

    #[test]
    fn failure_before_write_aborts() {
        let mut installer = installer_in(InstallState::Merged);
        let _ = installer.finish(Err(DuetiError::InvalidBootRegion("shift".into())));

        assert_eq!(installer.state(), InstallState::Aborted);
    }

    #[test]
    fn write_failure_state_is_kept() {
        let mut installer = installer_in(InstallState::WriteFailed);
        let _ = installer.finish(Err(DuetiError::InvalidInput("late".into())));

        assert_eq!(installer.state(), InstallState::WriteFailed);
        assert!(installer.begin().is_err());
    }
}
