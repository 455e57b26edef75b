//! hoard - Builds a deduplicated inventory of a directory tree.
//!
//! Usage:
//!   hoard scan [PATH]        Index and show a summary
//!   hoard list [PATH]        List cataloged entries
//!   hoard export [PATH]      Export the catalog to JSON
//!   hoard --help             Show help

use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hoard_analyze::{CatalogReport, ReportConfig, listing};
use hoard_core::{Catalog, FileKey, FileKind, FileRecord, IndexConfig, Status};
use hoard_scan::{IndexProgress, TraverseOutcome, Traverser, next_progress};

#[derive(Parser)]
#[command(
    name = "hoard",
    version,
    about = "Builds a deduplicated inventory of a directory tree",
    long_about = "hoard walks a directory tree and records every unique file, \
                  directory and link once, however many hard links point at it.\n\n\
                  The inventory is what a backup needs to copy."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct IndexArgs {
    /// Directory to index
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Initial catalog capacity (rounded up to a prime)
    #[arg(short, long, default_value = "4099")]
    capacity: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Index a tree and show a summary
    Scan {
        #[command(flatten)]
        index: IndexArgs,

        /// Number of largest files to show
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// List cataloged entries
    List {
        #[command(flatten)]
        index: IndexArgs,

        /// Only list entries of these kinds
        #[arg(short, long, value_delimiter = ',')]
        kind: Vec<KindArg>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Export the catalog and its report to JSON
    Export {
        #[command(flatten)]
        index: IndexArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    File,
    Dir,
    Symlink,
    Fifo,
    Socket,
    Char,
    Block,
    Unknown,
}

impl From<KindArg> for FileKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::File => FileKind::File,
            KindArg::Dir => FileKind::Directory,
            KindArg::Symlink => FileKind::Symlink,
            KindArg::Fifo => FileKind::Fifo,
            KindArg::Socket => FileKind::Socket,
            KindArg::Char => FileKind::CharDevice,
            KindArg::Block => FileKind::BlockDevice,
            KindArg::Unknown => FileKind::Unknown,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Scan { index, top } => run_scan(&index, top),
        Command::List {
            index,
            kind,
            format,
        } => run_list(&index, &kind, format),
        Command::Export { index, output } => run_export(&index, output),
    }
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("hoard=debug,warn")
    } else {
        EnvFilter::new("hoard=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Catalog built by one command and what indexing reported.
struct Indexed {
    root: PathBuf,
    catalog: Catalog,
    outcome: TraverseOutcome,
    /// False when indexing was interrupted.
    complete: bool,
}

/// Index `args.path`, honoring Ctrl-C.
///
/// An interrupted run keeps the partial catalog; any other failure is an
/// error.
fn index(args: &IndexArgs) -> Result<Indexed> {
    let config = IndexConfig::builder()
        .root(args.path.clone())
        .follow_symlinks(args.follow_symlinks)
        .initial_capacity(args.capacity)
        .build()
        .context("Invalid configuration")?;
    let mut catalog = Catalog::from_config(&config).context("Failed to create catalog")?;

    let traverser = Traverser::new(config);
    let cancel = traverser.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping...");
        cancel.cancel();
    })
    .context("Failed to set signal handler")?;

    let mut progress_rx = traverser.subscribe();
    let reporter = thread::spawn(move || {
        while let Some(progress) = next_progress(&mut progress_rx) {
            report_progress(&progress);
        }
    });

    eprintln!("Indexing {}...", args.path.display());
    let mut outcome = TraverseOutcome::default();
    let result = traverser.run(&mut catalog, &mut outcome);
    drop(traverser);
    let _ = reporter.join();

    let complete = match result {
        Ok(()) => true,
        Err(status) if status.is_cancelled() => {
            warn!(
                entries = catalog.len(),
                warnings = outcome.warnings.len(),
                "Indexing interrupted, keeping partial catalog"
            );
            false
        }
        Err(status) => return Err(eyre!("Indexing failed: {}", describe_status(&status))),
    };

    Ok(Indexed {
        root: args.path.clone(),
        catalog,
        outcome,
        complete,
    })
}

fn report_progress(progress: &IndexProgress) {
    info!(
        cataloged = progress.entries_cataloged,
        directories = progress.directories,
        rate = %format!("{:.0}/s", progress.entries_per_second()),
        "Indexing"
    );
}

/// Index and display a summary.
fn run_scan(args: &IndexArgs, top_n: usize) -> Result<()> {
    let Indexed {
        root,
        catalog,
        outcome,
        complete,
    } = index(args)?;

    let config = ReportConfig::builder()
        .top_n(top_n)
        .root(root.clone())
        .build()
        .context("Invalid report configuration")?;
    let report = CatalogReport::from_catalog(&catalog, &config);

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", root.display(), format_size(report.total_bytes));
    println!(
        " {} unique entries, {} files, {} directories",
        report.total_entries,
        report.file_count(),
        report.dir_count()
    );
    println!(
        " {} hard link aliases skipped, indexed in {:.2}s",
        outcome.aliases_skipped,
        outcome.duration.as_secs_f64()
    );
    if !complete {
        println!(" Interrupted, catalog is partial");
    }
    println!("{}", "─".repeat(60));
    println!();

    println!(" By kind:");
    for stats in &report.by_kind {
        println!(
            "   {:<14} {:>10} {:>12}",
            stats.kind.to_string(),
            stats.count,
            format_size(stats.bytes)
        );
    }
    println!();

    if !report.largest.is_empty() {
        println!(" Largest files:");
        for entry in &report.largest {
            println!("   {:>12}  {}", format_size(entry.size), entry.path.display());
        }
        println!();
    }
    println!(" Deepest path: {} levels", report.max_depth);

    print_warnings(&outcome);

    release(catalog);
    Ok(())
}

/// Index and list entries.
fn run_list(args: &IndexArgs, kinds: &[KindArg], format: OutputFormat) -> Result<()> {
    let Indexed { catalog, outcome, .. } = index(args)?;

    let config = ReportConfig::builder()
        .kinds(kinds.iter().copied().map(FileKind::from).collect::<Vec<_>>())
        .build()
        .context("Invalid report configuration")?;
    let rows = listing(&catalog, &config);

    match format {
        OutputFormat::Text => {
            for row in &rows {
                println!(
                    "{:<10} {:04o} {:>12}  {}",
                    row.kind.to_string(),
                    row.permissions,
                    format_size(row.size),
                    row.path.display()
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    print_warnings(&outcome);

    release(catalog);
    Ok(())
}

#[derive(Serialize)]
struct ExportRecord {
    device: u64,
    inode: u64,
    kind: FileKind,
    #[serde(flatten)]
    record: FileRecord,
}

impl From<(FileKey, FileRecord)> for ExportRecord {
    fn from((key, record): (FileKey, FileRecord)) -> Self {
        Self {
            device: key.device,
            inode: key.inode,
            kind: record.kind(),
            record,
        }
    }
}

#[derive(Serialize)]
struct Export<'a> {
    root: &'a Path,
    complete: bool,
    warnings: &'a [Status],
    report: CatalogReport,
    records: Vec<ExportRecord>,
}

/// Index and export the catalog to JSON.
fn run_export(args: &IndexArgs, output: Option<PathBuf>) -> Result<()> {
    let Indexed {
        root,
        catalog,
        outcome,
        complete,
    } = index(args)?;

    let config = ReportConfig::builder()
        .root(root.clone())
        .build()
        .context("Invalid report configuration")?;
    let report = CatalogReport::from_catalog(&catalog, &config);

    let export = Export {
        root: &root,
        complete,
        warnings: &outcome.warnings,
        report,
        records: catalog.sweep().into_iter().map(ExportRecord::from).collect(),
    };
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, json)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Sweep the catalog once, releasing every record.
fn release(catalog: Catalog) {
    let records = catalog.sweep();
    tracing::debug!(entries = records.len(), "Catalog released");
}

fn print_warnings(outcome: &TraverseOutcome) {
    if outcome.warnings.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("{} warning(s) during indexing:", outcome.warnings.len());
    for status in &outcome.warnings {
        eprintln!("  {}", describe_status(status));
    }
}

/// Render a status for people.
fn describe_status(status: &Status) -> String {
    let mut text = format!("{}: {}", status.code().describe(), status.message());
    if let Some(path) = status.path() {
        text.push_str(&format!(" '{}'", path.display()));
    }
    if let Some(err) = status.os_error() {
        text.push_str(&format!(" ({err})"));
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        let location = status.location();
        text.push_str(&format!(" at {}:{}", location.file(), location.line()));
    }
    text
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
