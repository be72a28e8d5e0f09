//! photo-tidy CLI
//!
//! Perceptual duplicate detection, folder reconciliation, flattening,
//! Dropbox mirroring, image counting and EXIF printing.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use humansize::{BINARY, format_size};
use indicatif::{ProgressBar, ProgressStyle};

use photo_tidy::dropbox::DropboxClient;
use photo_tidy::error::ConfigError;
use photo_tidy::hash::PerceptualHasher;
use photo_tidy::metadata::{format_fields, read_exif};
use photo_tidy::mirror::{MirrorEvent, RemoteStore, mirror, normalize_remote_folder};
use photo_tidy::report::{format_compare, format_dedupe, format_flatten};
use photo_tidy::scanner::count_images;
use photo_tidy::types::{
    CompareOptions, DedupeOptions, HashAlgorithm, MirrorOptions, OutputFormat, ScanConfig,
};
use photo_tidy::{compare, dedupe, flatten};

#[derive(Parser)]
#[command(name = "photo-tidy")]
#[command(about = "Find duplicate photos and keep photo folders in sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find perceptual duplicates under a folder and keep the best copy
    Dedupe {
        /// Folder to scan
        root: PathBuf,

        /// Move duplicates into <root>/duplicates
        #[arg(long = "move")]
        move_files: bool,

        /// Permanently delete duplicates
        #[arg(long)]
        delete: bool,

        /// Preview only, don't move or delete anything
        #[arg(long, alias = "dry_run")]
        dry_run: bool,

        /// Perceptual hash algorithm
        #[arg(long, value_enum, default_value = "mean")]
        algorithm: AlgorithmArg,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Log every file as it is indexed
        #[arg(short, long)]
        verbose: bool,
    },

    /// List images in SOURCE that have no match in TARGET, optionally copy them
    Compare {
        source: PathBuf,
        target: PathBuf,

        /// Copy missing images into TARGET under the same relative path
        #[arg(long)]
        sync: bool,

        /// With --sync: show what would be copied without copying
        #[arg(long)]
        dry_run: bool,

        /// Perceptual hash algorithm
        #[arg(long, value_enum, default_value = "dct")]
        algorithm: AlgorithmArg,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Log every file as it is indexed
        #[arg(short, long)]
        verbose: bool,
    },

    /// Move every file in subfolders up into the folder itself
    Flatten {
        root: PathBuf,

        /// Preview only, don't move files
        #[arg(long)]
        dry_run: bool,
    },

    /// Count image files under a folder
    Count { root: PathBuf },

    /// Print EXIF metadata of an image
    Metadata { image: PathBuf },

    /// Download a Dropbox folder tree to local disk
    Mirror {
        /// Dropbox API access token
        #[arg(long, env = "DROPBOX_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,

        /// Local folder to store files in
        #[arg(long, default_value = "dropbox_backup")]
        local_root: PathBuf,

        /// Dropbox folder to download, e.g. /Photos/2020 (default: everything)
        #[arg(long, default_value = "")]
        remote_folder: String,

        /// List files and sizes without downloading
        #[arg(long)]
        dry_run: bool,

        /// Skip files that already exist locally with the same size
        #[arg(long)]
        skip_existing_same_size: bool,
    },
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Commands::Dedupe { verbose, .. } | Commands::Compare { verbose, .. } => *verbose,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum AlgorithmArg {
    /// Average hash
    Mean,
    /// DCT hash (pHash)
    Dct,
    /// Gradient hash (dHash)
    Gradient,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Mean => HashAlgorithm::Mean,
            AlgorithmArg::Dct => HashAlgorithm::Dct,
            AlgorithmArg::Gradient => HashAlgorithm::Gradient,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.command.verbose());

    let result = match cli.command {
        Commands::Dedupe {
            root,
            move_files,
            delete,
            dry_run,
            algorithm,
            format,
            verbose,
        } => cmd_dedupe(
            &root,
            (move_files, delete, dry_run),
            algorithm.into(),
            format.into(),
            verbose,
        ),
        Commands::Compare {
            source,
            target,
            sync,
            dry_run,
            algorithm,
            format,
            verbose,
        } => cmd_compare(
            &source,
            &target,
            CompareOptions { sync, dry_run },
            algorithm.into(),
            format.into(),
            verbose,
        ),
        Commands::Flatten { root, dry_run } => cmd_flatten(&root, dry_run),
        Commands::Count { root } => cmd_count(&root),
        Commands::Metadata { image } => cmd_metadata(&image),
        Commands::Mirror {
            access_token,
            local_root,
            remote_folder,
            dry_run,
            skip_existing_same_size,
        } => cmd_mirror(
            access_token,
            MirrorOptions {
                local_root,
                remote_folder: normalize_remote_folder(&remote_folder),
                dry_run,
                skip_existing_same_size,
            },
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Warnings by default; `--verbose` shows per-file indexing. `RUST_LOG` wins.
fn init_logging(verbose: bool) {
    let default = if verbose { "warn,photo_tidy=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

// ============================================================================
// PROGRESS HELPERS
// ============================================================================

fn spinner(msg: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn require_dir(path: &Path) -> Result<(), String> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::NotADirectory(path.to_path_buf()).to_string())
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn cmd_dedupe(
    root: &Path,
    (move_files, delete, dry_run): (bool, bool, bool),
    algorithm: HashAlgorithm,
    format: OutputFormat,
    verbose: bool,
) -> Result<(), String> {
    // Validate everything before touching the filesystem
    let options = DedupeOptions::from_flags(move_files, delete, dry_run).map_err(|e| e.to_string())?;
    require_dir(root)?;

    let show_progress = format == OutputFormat::Human && !verbose;
    if show_progress {
        eprintln!("Scanning: {}", root.display());
    }

    let hasher = PerceptualHasher::new(algorithm);
    let sp = spinner("Indexing images...", show_progress);
    let result = dedupe::run(root, &options, &hasher, |seen, indexed| {
        sp.set_message(format!("Indexed {} of {} images...", indexed, seen));
    });
    sp.finish_and_clear();

    let report = result.map_err(|e| e.to_string())?;
    print!("{}", format_dedupe(&report, format));
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn cmd_compare(
    source: &Path,
    target: &Path,
    options: CompareOptions,
    algorithm: HashAlgorithm,
    format: OutputFormat,
    verbose: bool,
) -> Result<(), String> {
    require_dir(source)?;
    if target.exists() {
        require_dir(target)?;
    }
    let source = std::path::absolute(source).map_err(|e| e.to_string())?;
    let target = std::path::absolute(target).map_err(|e| e.to_string())?;

    let show_progress = format == OutputFormat::Human && !verbose;
    let hasher = PerceptualHasher::new(algorithm);
    let sp = spinner("Indexing images...", show_progress);
    let result = compare::run(
        &source,
        &target,
        &options,
        &hasher,
        |root, seen, indexed| {
            sp.set_message(format!(
                "{}: indexed {} of {} images...",
                root.display(),
                indexed,
                seen
            ));
        },
    );
    sp.finish_and_clear();

    let report = result.map_err(|e| e.to_string())?;
    print!("{}", format_compare(&report, format));
    if format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn cmd_flatten(root: &Path, dry_run: bool) -> Result<(), String> {
    require_dir(root)?;
    let report = flatten::flatten(root, dry_run).map_err(|e| e.to_string())?;
    print!("{}", format_flatten(&report));
    Ok(())
}

fn cmd_count(root: &Path) -> Result<(), String> {
    require_dir(root)?;
    let extensions = ScanConfig::new(root).extensions;
    let total = count_images(root, &extensions).map_err(|e| e.to_string())?;
    println!("Total image files found: {}", total);
    Ok(())
}

fn cmd_metadata(image: &Path) -> Result<(), String> {
    let fields = read_exif(image).map_err(|e| e.to_string())?;

    if fields.is_empty() {
        println!("No EXIF metadata found.");
        return Ok(());
    }

    println!("Metadata for: {}", image.display());
    println!();
    print!("{}", format_fields(&fields));
    Ok(())
}

fn cmd_mirror(access_token: Option<String>, options: MirrorOptions) -> Result<(), String> {
    let token = access_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingToken.to_string())?;
    let options = MirrorOptions {
        local_root: std::path::absolute(&options.local_root).map_err(|e| e.to_string())?,
        ..options
    };

    println!("Local backup root: {}", options.local_root.display());
    println!(
        "Remote folder: {}",
        if options.remote_folder.is_empty() { "/" } else { &options.remote_folder }
    );
    println!("Dry run: {}", options.dry_run);
    println!("Skip existing same size: {}", options.skip_existing_same_size);
    println!();

    let client = DropboxClient::new(token);
    let account = client
        .current_account()
        .map_err(|e| format!("Could not verify Dropbox token / account: {}", e))?;
    println!(
        "Connected to Dropbox account: {} ({})",
        account.display_name, account.email
    );

    if !options.dry_run {
        std::fs::create_dir_all(&options.local_root).map_err(|e| e.to_string())?;
    }

    let start = Instant::now();
    let totals = mirror(&client, &options, |event| match event {
        MirrorEvent::Listing { folder } => println!("[LIST] folder: {}", folder),
        MirrorEvent::MorePages { .. } => println!("  ... more items, continuing"),
        MirrorEvent::Found { path, size } => println!("[FILE] {} ({} bytes)", path, size),
        MirrorEvent::SkippedExisting { path } => {
            println!("[SKIP] {} (already downloaded, size matches)", path)
        }
        MirrorEvent::Downloading { path, local } => {
            println!("[GET ] {} -> {}", path, local.display())
        }
        MirrorEvent::Unsupported { path } => println!("[SKIP] unsupported entry: {}", path),
    });
    let elapsed = start.elapsed();

    println!();
    println!("======== SUMMARY ========");
    println!(
        "Files {}: {}",
        if options.dry_run { "found" } else { "downloaded" },
        totals.files
    );
    println!(
        "Total bytes: {} (~{})",
        totals.bytes,
        format_size(totals.bytes, BINARY)
    );
    println!("Elapsed time: {:.1}s", elapsed.as_secs_f64());
    println!("Local backup root: {}", options.local_root.display());
    println!("=========================");

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_dedupe_move_and_delete_touches_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"same").unwrap();
        fs::write(dir.path().join("b.png"), b"same").unwrap();

        let cli = Cli::try_parse_from([
            "photo-tidy",
            "dedupe",
            dir.path().to_str().unwrap(),
            "--move",
            "--delete",
        ])
        .unwrap();
        let Commands::Dedupe {
            root,
            move_files,
            delete,
            dry_run,
            ..
        } = cli.command
        else {
            panic!("expected dedupe");
        };

        let result = cmd_dedupe(
            &root,
            (move_files, delete, dry_run),
            HashAlgorithm::Mean,
            OutputFormat::Human,
            false,
        );

        assert_eq!(result, Err(ConfigError::MoveAndDelete.to_string()));
        assert!(dir.path().join("a.png").exists());
        assert!(dir.path().join("b.png").exists());
        assert!(!dir.path().join(dedupe::DUPLICATES_DIR).exists());
    }

    #[test]
    fn test_dedupe_flags_checked_before_root() {
        let result = cmd_dedupe(
            Path::new("/nonexistent/photos"),
            (true, true, false),
            HashAlgorithm::Mean,
            OutputFormat::Human,
            false,
        );
        assert_eq!(result, Err(ConfigError::MoveAndDelete.to_string()));
    }

    #[test]
    fn test_dry_run_underscore_alias() {
        let cli = Cli::try_parse_from(["photo-tidy", "dedupe", "/photos", "--dry_run"]).unwrap();
        assert!(matches!(cli.command, Commands::Dedupe { dry_run: true, .. }));
    }
}
