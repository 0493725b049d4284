//! duscope - a disk-usage scanner with incremental caching.
//!
//! Usage:
//!   duscope scan [PATH]        Scan and show where the space goes
//!   duscope list [PATH]        Instant listing using cached sizes
//!   duscope cache list         Show cached scans
//!   duscope export [PATH]      Export a scan to JSON
//!   duscope --help             Show help

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use duscope_cache::{CacheConfig, NavigationCache, Navigator, ScanCache, TreeSnapshot};
use duscope_core::{FileTree, NodeIndex, format_count, format_size};
use duscope_scan::{BrowseLister, CancellationToken, ProgressThrottle, ScanConfig, TreeScanner};

#[derive(Parser)]
#[command(
    name = "duscope",
    version,
    about = "A concurrent, cancellable disk-usage scanner",
    long_about = "duscope shows where your disk space goes.\n\n\
                  Completed scans are cached, so revisiting a directory (or any \
                  directory inside a scanned one) is instant."
)]
struct Cli {
    /// Cache directory (defaults to the platform cache dir)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Days after which a cached scan is considered stale
    #[arg(long, global = true, default_value = "7")]
    cache_ttl_days: u64,

    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and show a size summary
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Number of largest entries to show per directory
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,

        /// Rescan even if a fresh cached result exists
        #[arg(short, long)]
        refresh: bool,

        /// Neither read nor write the cache
        #[arg(long)]
        no_cache: bool,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Skip hidden entries
        #[arg(long)]
        no_hidden: bool,

        /// Glob patterns to skip (repeatable)
        #[arg(short, long = "ignore")]
        ignore: Vec<String>,
    },

    /// List one directory instantly, with sizes from the cache
    List {
        /// Directory to list
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Compute every subdirectory's size now (blocking, no cache)
        #[arg(short, long)]
        sized: bool,
    },

    /// Inspect or manage the scan cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Export a scan to JSON
    Export {
        /// Path to export
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rescan even if a fresh cached result exists
        #[arg(short, long)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// List cached scans
    List,
    /// Show whether a path has a fresh cached scan
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Drop the cached scan of a path
    Invalidate { path: PathBuf },
    /// Drop every cached scan
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan {
            ref path,
            depth,
            top,
            refresh,
            no_cache,
            threads,
            no_hidden,
            ref ignore,
        } => {
            let config = ScanConfig::builder()
                .threads(threads)
                .include_hidden(!no_hidden)
                .ignore_patterns(ignore.clone())
                .build()
                .wrap_err("Invalid scan options")?;
            let cache = if no_cache { None } else { Some(open_cache(&cli)?) };
            run_scan(path, config, cache, refresh, depth, top).await?;
        }
        Command::List { ref path, sized } => {
            if sized {
                run_list_sized(path)?;
            } else {
                run_list(path, open_cache(&cli)?)?;
            }
        }
        Command::Cache { ref action } => {
            run_cache(action, open_cache(&cli)?)?;
        }
        Command::Export {
            ref path,
            ref output,
            refresh,
        } => {
            run_export(path, output.as_deref(), open_cache(&cli)?, refresh).await?;
        }
    }

    Ok(())
}

/// Log to stderr; `-v` raises the default level, `RUST_LOG` wins.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_cache(cli: &Cli) -> Result<ScanCache> {
    let dir = match &cli.cache_dir {
        Some(dir) => dir.clone(),
        None => CacheConfig::default_dir()
            .ok_or_else(|| eyre!("No cache directory available; pass --cache-dir"))?,
    };
    let config = CacheConfig::builder()
        .dir(dir)
        .expiration(ttl_from_days(cli.cache_ttl_days))
        .build()
        .wrap_err("Invalid cache options")?;
    debug!(dir = %config.dir.display(), ttl_days = cli.cache_ttl_days, "Opening cache");
    Ok(ScanCache::open(config))
}

/// Huge day counts saturate instead of overflowing.
fn ttl_from_days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(24 * 60 * 60))
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .wrap_err_with(|| format!("Invalid path: {}", path.display()))
}

/// Scan `path` on a blocking thread, drawing throttled progress on stderr.
/// Ctrl-C cancels. Returns the tree and whether the scan was cancelled.
async fn scan_with_progress(path: PathBuf, config: ScanConfig) -> Result<(FileTree, bool)> {
    let scanner = TreeScanner::new(config);
    let mut progress_rx = scanner.subscribe();
    let cancel = CancellationToken::new();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let reporter = tokio::spawn(async move {
        let mut throttle = ProgressThrottle::default();
        loop {
            match progress_rx.recv().await {
                Ok(progress) => {
                    if throttle.ready() {
                        eprint!(
                            "\r\x1b[2K {} items, {} ({:.0}/s)",
                            format_count(progress.items_scanned),
                            format_size(progress.bytes_scanned),
                            progress.items_per_second()
                        );
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        eprint!("\r\x1b[2K");
    });

    let token = cancel.clone();
    let tree = tokio::task::spawn_blocking(move || scanner.scan(&path, &token))
        .await
        .wrap_err("Scan task failed")?;

    interrupt.abort();
    let _ = reporter.await;
    Ok((tree, cancel.is_cancelled()))
}

async fn run_scan(
    path: &Path,
    config: ScanConfig,
    cache: Option<ScanCache>,
    refresh: bool,
    depth: u32,
    top: usize,
) -> Result<()> {
    let path = resolve_path(path)?;

    if let Some(cache) = cache.as_ref().filter(|_| !refresh) {
        if let Some(tree) = cache.get(&path) {
            info!(path = %path.display(), "Serving scan from cache");
            eprintln!("Using cached scan of {} (--refresh to rescan)", path.display());
            print_summary(&tree, depth, top);
            return Ok(());
        }
    }

    eprintln!("Scanning {}...", path.display());
    let (tree, cancelled) = scan_with_progress(path.clone(), config).await?;

    if cancelled {
        info!(path = %path.display(), "Scan cancelled, result not cached");
        eprintln!("Scan cancelled");
        eprintln!(
            " Partial result: {} items, {} (not cached)",
            format_count(tree.stats().total_items()),
            format_size(tree.total_size())
        );
        return Ok(());
    }

    print_summary(&tree, depth, top);
    if let Some(cache) = cache {
        cache.put(&path, &tree);
    }
    Ok(())
}

fn run_list(path: &Path, cache: ScanCache) -> Result<()> {
    let path = resolve_path(path)?;
    let navigator = Navigator::new(NavigationCache::new(), cache);
    let resolved = navigator.resolve(&path);
    let tree = resolved.node.tree();
    let node = resolved.node.node();

    println!(
        "{} - {} (from {})",
        path.display(),
        size_label(node.known_size()),
        resolved.source.label()
    );
    for child in tree.children_sorted_by_size(resolved.node.index()) {
        let child = tree.node(child);
        let marker = if child.is_dir { "/" } else { "" };
        println!(
            "  {:>10}  {}{}",
            size_label(child.known_size()),
            child.name,
            marker
        );
    }
    print_warnings(tree);
    Ok(())
}

fn run_list_sized(path: &Path) -> Result<()> {
    let path = resolve_path(path)?;
    let mut nodes = BrowseLister::default().list_sized(&path);
    nodes.sort_by(|a, b| b.size.cmp(&a.size));

    let total: u64 = nodes.iter().map(|n| n.size).sum();
    println!("{} - {}", path.display(), format_size(total));
    for node in &nodes {
        let marker = if node.is_dir { "/" } else { "" };
        println!("  {:>10}  {}{}", format_size(node.size), node.name, marker);
    }
    Ok(())
}

fn run_cache(action: &CacheCommand, cache: ScanCache) -> Result<()> {
    match action {
        CacheCommand::List => {
            let entries = cache.entries();
            if entries.is_empty() {
                println!("No cached scans in {}", cache.dir().display());
                return Ok(());
            }
            for entry in &entries {
                let state = if cache.is_expired(entry) { " (stale)" } else { "" };
                println!(
                    "{:>10}  {}  {}{}",
                    format_size(entry.size),
                    entry.cached_at.format("%Y-%m-%d %H:%M"),
                    entry.path.display(),
                    state
                );
            }
        }
        CacheCommand::Status { path } => {
            let path = path.canonicalize().unwrap_or_else(|_| path.clone());
            let state = if cache.is_fresh(&path) {
                "fresh"
            } else {
                "not cached"
            };
            println!("{}: {}", path.display(), state);
        }
        CacheCommand::Invalidate { path } => {
            let path = path.canonicalize().unwrap_or_else(|_| path.clone());
            if cache.invalidate(&path) {
                println!("Invalidated {}", path.display());
            } else {
                println!("Nothing cached for {}", path.display());
            }
        }
        CacheCommand::Clear => {
            let count = cache.len();
            cache.clear();
            println!("Removed {} cached scan(s)", count);
        }
    }
    Ok(())
}

async fn run_export(
    path: &Path,
    output: Option<&Path>,
    cache: ScanCache,
    refresh: bool,
) -> Result<()> {
    let path = resolve_path(path)?;

    let cached = if refresh { None } else { cache.get(&path) };
    let tree = match cached {
        Some(tree) => tree,
        None => {
            eprintln!("Scanning {}...", path.display());
            let (tree, cancelled) = scan_with_progress(path.clone(), ScanConfig::default()).await?;
            if cancelled {
                bail!("Scan cancelled");
            }
            cache.put(&path, &tree);
            tree
        }
    };

    let json = serde_json::to_string_pretty(&TreeSnapshot::capture(&tree))?;
    match output {
        Some(output_path) => {
            std::fs::write(output_path, json)
                .wrap_err_with(|| format!("Failed to write {}", output_path.display()))?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_summary(tree: &FileTree, depth: u32, top: usize) {
    let stats = tree.stats();

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", tree.root_path().display(), format_size(stats.total_size));
    println!(
        " {} files, {} directories",
        format_count(stats.total_files),
        format_count(stats.total_dirs)
    );
    println!(" Scanned in {:.2}s", tree.scan_duration.as_secs_f64());
    if let Some((path, size)) = &stats.largest_file {
        println!(" Largest file: {} ({})", path.display(), format_size(*size));
    }
    println!("{}", "─".repeat(60));
    println!();

    print_node(tree, tree.root_index(), 0, depth, top, tree.root().size);
    print_warnings(tree);
}

/// Print a node and its largest children.
fn print_node(
    tree: &FileTree,
    index: NodeIndex,
    depth: u32,
    max_depth: u32,
    top_n: usize,
    root_size: u64,
) {
    let node = tree.node(index);
    let indent = "  ".repeat(depth as usize);
    let ratio = if root_size > 0 {
        node.size as f64 / root_size as f64 * 100.0
    } else {
        0.0
    };

    let name = if depth == 0 {
        node.path.display().to_string()
    } else {
        node.name.to_string()
    };
    let dir_marker = if node.is_dir() { "/" } else { "" };

    println!(
        "{}{}{:<40} {:>10} {:>5.1}% {}",
        indent,
        if node.is_dir() { "▼ " } else { "  " },
        truncate(&format!("{}{}", name, dir_marker), 40),
        size_label(node.known_size()),
        ratio,
        make_bar(ratio / 100.0, 10)
    );

    if node.is_dir() && depth < max_depth {
        let children = tree.children_sorted_by_size(index);
        let remaining = children.len().saturating_sub(top_n);

        for &child in children.iter().take(top_n) {
            print_node(tree, child, depth + 1, max_depth, top_n, root_size);
        }

        if remaining > 0 {
            let indent = "  ".repeat((depth + 1) as usize);
            println!("{}  ... and {} more", indent, remaining);
        }
    }
}

fn print_warnings(tree: &FileTree) {
    if tree.warnings.is_empty() {
        return;
    }
    println!();
    println!("{} warning(s):", tree.warnings.len());
    for warning in tree.warnings.iter().take(10) {
        println!("  {}", warning.message);
    }
    if tree.warnings.len() > 10 {
        println!("  ... and {} more", tree.warnings.len() - 10);
    }
}

/// Size for display; unscanned directories show as `?`.
fn size_label(size: Option<u64>) -> String {
    size.map(format_size).unwrap_or_else(|| "?".to_string())
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Truncate a string to `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_days() {
        assert_eq!(ttl_from_days(7).as_secs(), 604_800);
        assert_eq!(ttl_from_days(u64::MAX).as_secs(), u64::MAX);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["duscope", "--cache-ttl-days", "1", "cache", "clear"]).unwrap();
        assert_eq!(cli.cache_ttl_days, 1);
        assert!(matches!(cli.command, Command::Cache { action: CacheCommand::Clear }));
    }
}
