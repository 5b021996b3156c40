//! pixdex - Incremental photo and video library indexer.
//!
//! Usage:
//!   pixdex list [PATH]       List a directory through the persistent index
//!   pixdex meta <FILE>       Print the normalized metadata of one file
//!   pixdex scan [PATH]       Scan a tree and show a summary
//!   pixdex --help            Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing_subscriber::EnvFilter;

use pixdex_core::{DirectoryNode, IndexConfig, MediaItem, ScanConfig, Sensitivity};
use pixdex_index::{DirectoryListing, ListingSource, MemoryStore, ReconciliationEngine};
use pixdex_meta::{MetadataExtractor, Parsers};
use pixdex_scan::DirectoryScanner;

#[derive(Parser)]
#[command(
    name = "pixdex",
    version,
    about = "Incremental photo and video library indexer",
    long_about = "pixdex extracts normalized metadata from photos and videos and keeps \
                  a persistent index of a media library in step with the filesystem."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory through the persistent index
    List {
        /// Directory to list
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Index snapshot to load and update
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// How aggressively the index is revalidated (low, medium, high)
        #[arg(long, default_value = "low")]
        sensitivity: Sensitivity,

        /// Age in seconds after which a medium-sensitivity listing is refreshed
        #[arg(long, default_value = "3600")]
        timeout_secs: u64,

        /// Media previewed per subdirectory
        #[arg(short, long, default_value = "5")]
        preview: usize,

        /// Scan depth below the listed directory
        #[arg(short, long)]
        depth: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the normalized metadata of one photo or video
    Meta {
        /// Media file
        file: PathBuf,
    },

    /// Scan a tree and show a summary
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum scan depth
        #[arg(short, long)]
        depth: Option<u32>,

        /// Include hidden files and directories
        #[arg(long)]
        hidden: bool,

        /// Glob patterns of names to skip
        #[arg(short, long)]
        ignore: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pixdex=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::List {
            path,
            store,
            sensitivity,
            timeout_secs,
            preview,
            depth,
            format,
        } => {
            let scan = ScanConfig::builder()
                .max_depth(depth)
                .build()
                .context("Invalid scan settings")?;
            let config = IndexConfig::builder()
                .scan(scan)
                .sensitivity(sensitivity)
                .cached_timeout_ms(timeout_secs.saturating_mul(1000))
                .preview_size(preview)
                .build()
                .context("Invalid index settings")?;
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(run_list(&path, store.as_deref(), config, format))?;
        }
        Command::Meta { file } => {
            run_meta(&file)?;
        }
        Command::Scan {
            path,
            depth,
            hidden,
            ignore,
        } => {
            let config = ScanConfig::builder()
                .max_depth(depth)
                .include_hidden(hidden)
                .ignore_patterns(ignore)
                .build()
                .context("Invalid scan settings")?;
            run_scan(&path, config)?;
        }
    }

    Ok(())
}

/// List a directory through the index, then persist the snapshot.
async fn run_list(
    path: &Path,
    store_path: Option<&Path>,
    config: IndexConfig,
    format: OutputFormat,
) -> Result<()> {
    let store = match store_path {
        Some(file) => MemoryStore::load(file)
            .with_context(|| format!("Failed to load index {}", file.display()))?,
        None => MemoryStore::new(),
    };
    let store = Arc::new(store);
    let engine = ReconciliationEngine::new(config, Parsers::new(), store.clone())
        .context("Failed to create engine")?;

    let listing = engine
        .list(path, None)
        .await
        .with_context(|| format!("Failed to list {}", path.display()))?;
    // Let a refresh finish so the snapshot carries it.
    engine.wait_for_background().await;

    if let Some(file) = store_path {
        store
            .save(file)
            .with_context(|| format!("Failed to save index {}", file.display()))?;
    }

    let DirectoryListing::Directory { node, source } = listing else {
        println!("Not modified");
        return Ok(());
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        OutputFormat::Text => {
            let origin = match source {
                ListingSource::Scanned => "scanned",
                ListingSource::Persisted {
                    background_rescan: true,
                } => "index, refreshed",
                ListingSource::Persisted { .. } => "index",
            };
            print_listing(&node, origin);
        }
    }
    Ok(())
}

/// Extract and print the metadata of one file.
fn run_meta(file: &Path) -> Result<()> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| eyre!("Not a file: {}", file.display()))?;
    let kind = ScanConfig::default()
        .classify(&name)
        .ok_or_else(|| eyre!("Unsupported media type: {}", file.display()))?;
    if !file.is_file() {
        return Err(eyre!("Not a file: {}", file.display()));
    }

    let extractor = MetadataExtractor::default();
    let metadata = extractor.extract(file, kind);
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

/// Run a scan and display a summary.
fn run_scan(path: &Path, config: ScanConfig) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;

    eprintln!("Scanning {}...", path.display());

    let scanner = DirectoryScanner::new(config, Parsers::new()).context("Invalid scan settings")?;
    let report = scanner.scan(&path).context("Scan failed")?;
    let stats = &report.stats;

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} - {}",
        path.display(),
        format_size(stats.media_bytes)
    );
    println!(
        " {} photos, {} videos, {} directories",
        stats.photos, stats.videos, stats.directories
    );
    if stats.ignored > 0 {
        println!(" {} entries ignored", stats.ignored);
    }
    if let Some((largest, size)) = &stats.largest_file {
        println!(" Largest: {} ({})", largest.display(), format_size(*size));
    }
    println!(" Scanned in {:.2}s", report.scan_duration.as_secs_f64());
    println!("{}", "─".repeat(60));
    println!();

    print_tree(&report.root, 0);

    if report.has_warnings() {
        println!();
        println!("{} warning(s) during scan", report.warnings.len());
    }

    Ok(())
}

fn print_listing(node: &DirectoryNode, origin: &str) {
    println!("{} ({origin})", node.path.display());
    println!(
        " {} photos, {} videos, {} directories",
        node.photo_count(),
        node.video_count(),
        node.directories.len()
    );
    println!();

    for item in &node.media {
        println!("  {}", describe(item));
    }
    for dir in &node.directories {
        let state = if dir.scanned { "" } else { " (not scanned)" };
        println!("  {}/{state}", dir.name);
        for item in &dir.media {
            println!("    {}", describe(item));
        }
    }
}

fn print_tree(node: &DirectoryNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let total = node.total_media();
    let marker = if node.scanned { "" } else { " (not scanned)" };
    println!(
        "{indent}{}/ {} media{marker}",
        truncate(&node.name, 40),
        total
    );
    for child in &node.directories {
        print_tree(child, depth + 1);
    }
}

fn describe(item: &MediaItem) -> String {
    let size = item.metadata.size();
    let date = chrono::DateTime::from_timestamp_millis(item.metadata.creation_date())
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<32} {:>5}x{:<5} {:>16} {:>10}",
        truncate(&item.name, 32),
        size.width,
        size.height,
        date,
        format_size(item.metadata.file_size())
    )
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensitivity_of(args: &[&str]) -> Sensitivity {
        match Cli::try_parse_from(args).unwrap().command {
            Command::List { sensitivity, .. } => sensitivity,
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_sensitivity_parses_into_core_type() {
        assert_eq!(sensitivity_of(&["pixdex", "list", "."]), Sensitivity::Low);
        assert_eq!(
            sensitivity_of(&["pixdex", "list", ".", "--sensitivity", "High"]),
            Sensitivity::High
        );
        assert_eq!(
            sensitivity_of(&["pixdex", "list", "--sensitivity", "medium"]),
            Sensitivity::Medium
        );
        assert!(Cli::try_parse_from(["pixdex", "list", "--sensitivity", "extreme"]).is_err());
    }
}
