use clap::{Args, Parser, Subcommand};
use dueti_core::{
    BootFileResolver, BootFiles, DuetiError, FilesystemKind, InstallOptions, InstallReport,
};
use dueti_filesystems::{detect_filesystem, BootstrapInstaller};
use log::{debug, error, info, LevelFilter};
use std::path::{Path, PathBuf};

mod copy;
mod search;
mod sources;

use copy::{apply_renames, copy_sources, default_renames, RenameSpec};
use search::{DownloadSource, ExtractedTree, SearchPatterns};
use sources::CommandLineFiles;

#[derive(Parser)]
#[command(name = "dueti")]
#[command(about = "DUET Installer - writes legacy BIOS boot code to disks and partitions", long_about = None)]
struct Cli {
    /// Logging level. One of: debug, info, warning, error, critical
    #[arg(short = 'l', long = "log-level", visible_alias = "level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the filesystem detected on a partition
    Detect {
        /// Partition device or image
        partition: PathBuf,
    },
    /// Write MBR/PBR boot code and copy bootloader files
    Install(InstallArgs),
}

#[derive(Args)]
struct InstallArgs {
    /// Path to read the mbr boot sector from
    #[arg(long)]
    mbr_source: Option<PathBuf>,
    /// Path to read the pbr boot sector from
    #[arg(long)]
    pbr_source: Option<PathBuf>,
    /// Path to copy bootloader file(s) from
    #[arg(long)]
    copy_source: Vec<PathBuf>,
    /// Extracted release to search for boot files
    #[arg(long, value_name = "DIR")]
    search_dir: Option<PathBuf>,
    /// Release the files come from: opencore, clover, refindplus, edk2015,
    /// edk2020, grub4dos, an author/name GitHub repository or a URL.
    /// Nothing is downloaded; the archive must already be extracted under
    /// --download-dest
    #[arg(long)]
    download_source: Option<DownloadSource>,
    /// Where downloaded releases are extracted
    #[arg(long, default_value = "./downloads")]
    download_dest: PathBuf,
    /// Search regex for the mbr boot sector
    #[arg(long)]
    mbr_regex: Option<String>,
    /// Search regex for the pbr boot sector. Defaults depend on the filesystem
    #[arg(long)]
    pbr_regex: Option<String>,
    /// Search regex for bootloader file(s)
    #[arg(long)]
    copy_regex: Option<String>,
    /// Disk to write the mbr boot sector to
    #[arg(long)]
    mbr_dest: Option<PathBuf>,
    /// Partition to write the pbr boot sector to
    #[arg(long)]
    pbr_dest: Option<PathBuf>,
    /// Directory to copy bootloader file(s) to
    #[arg(long)]
    copy_dest: Option<PathBuf>,
    /// Rename a copied file at the destination
    #[arg(long, value_name = "OLDNAME:NEWNAME")]
    rename: Vec<RenameSpec>,
    /// Assemble boot sectors without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Read written sectors back and compare
    #[arg(long)]
    verify: bool,
    /// Print installation reports as JSON
    #[arg(long)]
    json: bool,
}

fn parse_level(level: &str) -> Result<LevelFilter, DuetiError> {
    match level.to_lowercase().as_str() {
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warning" | "warn" => Ok(LevelFilter::Warn),
        "error" | "critical" => Ok(LevelFilter::Error),
        other => Err(DuetiError::Configuration(format!(
            "unknown log level '{}'",
            other
        ))),
    }
}

fn init_logging(level: Option<&str>) -> Result<(), DuetiError> {
    let mut builder = match level {
        Some(level) => {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(parse_level(level)?);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")),
    };
    builder.format_timestamp(None).format_target(false).init();
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    debug!("log level = {}", log::max_level());

    if let Err(e) = run(cli.command) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Detect { partition } => {
            let kind = detect_filesystem(&partition)?;
            if !kind.is_supported() {
                return Err(DuetiError::UnsupportedFilesystem(partition).into());
            }
            println!("{}", kind);
        }
        Commands::Install(args) => install(args)?,
    }
    Ok(())
}

/// Root of the extracted release to search, if any
fn search_root(args: &InstallArgs) -> Option<PathBuf> {
    match (&args.search_dir, &args.download_source) {
        (Some(dir), _) => Some(dir.clone()),
        (None, Some(source)) => {
            info!(
                "searching {} for files extracted from {}",
                args.download_dest.display(),
                source
            );
            Some(args.download_dest.clone())
        }
        (None, None) => None,
    }
}

fn resolve_files(
    args: &InstallArgs,
    search_root: Option<&Path>,
    filesystem: Option<FilesystemKind>,
) -> Result<BootFiles, DuetiError> {
    let mut files = CommandLineFiles {
        mbr_source: args.mbr_source.clone(),
        pbr_source: args.pbr_source.clone(),
        copy_sources: args.copy_source.clone(),
    }
    .resolve()?;

    // Paths given explicitly win over anything found in the release
    if let Some(root) = search_root {
        let patterns = SearchPatterns::new(
            args.mbr_regex.as_deref(),
            args.pbr_regex.as_deref(),
            args.copy_regex.as_deref(),
            filesystem,
        )?;
        let found = ExtractedTree::new(root, patterns).resolve()?;
        files.mbr_source = files.mbr_source.or(found.mbr_source);
        files.pbr_source = files.pbr_source.or(found.pbr_source);
        if files.copy_sources.is_empty() {
            files.copy_sources = found.copy_sources;
        }
    }
    Ok(files)
}

fn install(args: InstallArgs) -> anyhow::Result<()> {
    if args.mbr_dest.is_none() && args.pbr_dest.is_none() && args.copy_dest.is_none() {
        return Err(DuetiError::InvalidInput(
            "one of --mbr-dest, --pbr-dest or --copy-dest is required".to_string(),
        )
        .into());
    }

    // Refuse an unknown partition before the MBR is touched. This is the
    // only time the partition header is read.
    let pbr_kind = match &args.pbr_dest {
        Some(dest) => {
            let kind = detect_filesystem(dest)?;
            if !kind.is_supported() {
                return Err(DuetiError::UnsupportedFilesystem(dest.clone()).into());
            }
            debug!("FS={}", kind);
            Some(kind)
        }
        None => None,
    };

    let search = search_root(&args);
    let files = resolve_files(&args, search.as_deref(), pbr_kind)?;
    let missing = |kind: &str| {
        let message = if search.is_some() {
            format!("{} source not found in the release - exiting", kind)
        } else {
            format!(
                "one of --search-dir, --download-source or --{}-source is required with --{}-dest",
                kind, kind
            )
        };
        DuetiError::InvalidInput(message)
    };

    // Every destination needs its source before anything is written
    let mbr = match (&args.mbr_dest, &files.mbr_source) {
        (Some(dest), Some(source)) => Some((source.clone(), dest.clone())),
        (Some(_), None) => return Err(missing("mbr").into()),
        (None, _) => None,
    };
    let pbr = match (&args.pbr_dest, &files.pbr_source, pbr_kind) {
        (Some(dest), Some(source), Some(kind)) => Some((kind, source.clone(), dest.clone())),
        (Some(_), _, _) => return Err(missing("pbr").into()),
        (None, _, _) => None,
    };

    let options = InstallOptions {
        dry_run: args.dry_run,
        verify_after_write: args.verify,
    };
    let mut reports: Vec<InstallReport> = Vec::new();

    if let Some((source, dest)) = &mbr {
        let mut installer = BootstrapInstaller::new(options.clone());
        reports.push(installer.install_mbr(source, dest)?);
    }

    if let Some((kind, source, dest)) = &pbr {
        let mut installer = BootstrapInstaller::new(options.clone());
        reports.push(installer.install_pbr_classified(*kind, source, dest)?);
    }

    if let Some(copy_dest) = &args.copy_dest {
        if files.copy_sources.is_empty() {
            info!("no bootloader files to copy");
        } else if args.dry_run {
            info!(
                "dry run: not copying {} path(s) to {}",
                files.copy_sources.len(),
                copy_dest.display()
            );
        } else {
            let renames = if args.rename.is_empty() {
                default_renames()
            } else {
                args.rename.clone()
            };
            copy_sources(&files.copy_sources, copy_dest)?;
            apply_renames(copy_dest, &renames)?;
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    info!("done");
    Ok(())
}
