//! CLI entry point for sharewatch.
//!
//! This binary watches the files and directories given on the command line
//! and prints classified, debounced change events until interrupted.
//!
//! # Usage
//!
//! ```bash
//! sw-watch [OPTIONS] <PATHS>...
//!
//! # Watch a share recursively, ignoring editor droppings
//! sw-watch -i '*.swp' -i '.*' /srv/share
//!
//! # Emit JSON lines including immediate events, 500ms quiet period
//! sw-watch --json --immediate -d 500 /srv/share/report.txt
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use sw_core::{Config, OutputConfig, OutputFormat};
use sw_watcher::{FileWatcher, WatchEvent};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watch files and directories and report classified, debounced changes.
#[derive(Debug, Parser)]
#[command(name = "sw-watch", version, about, long_about = None)]
struct Cli {
    /// Files and directories to watch.
    #[arg(required = true, num_args = 1..)]
    paths: Vec<Utf8PathBuf>,

    /// JSON configuration file. Command-line flags override its values.
    #[arg(short, long, env = "SW_WATCH_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Watch directories recursively (the default).
    #[arg(short, long, conflicts_with = "no_recursive")]
    recursive: bool,

    /// Watch only the listed directories, not their subdirectories.
    #[arg(long)]
    no_recursive: bool,

    /// Quiet period in milliseconds before coalesced events are reported.
    #[arg(short, long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Filename glob to ignore (repeatable).
    #[arg(short, long = "ignore", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Print events as JSON lines.
    #[arg(long)]
    json: bool,

    /// Also print immediate, pre-debounce events.
    #[arg(long)]
    immediate: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. Logs go
/// to stderr so stdout carries only events.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the optional configuration file and CLI flags.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the merged
/// configuration is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load config {path}: {e}"))?,
        None => Config::default(),
    };

    if cli.recursive {
        config.watch.recursive = true;
    }
    if cli.no_recursive {
        config.watch.recursive = false;
    }
    if let Some(debounce_ms) = cli.debounce_ms {
        config.watch.debounce_ms = debounce_ms;
    }
    for glob in &cli.ignore {
        if !config.watch.ignore_patterns.contains(glob) {
            config.watch.ignore_patterns.push(glob.clone());
        }
    }
    if cli.json {
        config.output.format = OutputFormat::Json;
    }
    if cli.immediate {
        config.output.show_immediate = true;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATION
// =============================================================================

/// Adds every path to the watcher. Returns how many are being watched.
fn add_paths(watcher: &mut FileWatcher, paths: &[Utf8PathBuf], recursive: bool) -> usize {
    let engine = watcher.engine_mut();
    paths
        .iter()
        .filter(|path| {
            if path.is_dir() {
                engine.add_directory(path, recursive)
            } else {
                engine.add_file(path)
            }
        })
        .count()
}

/// Watches `paths` and prints events until interrupted.
///
/// # Errors
///
/// Returns an error if the OS watcher cannot be created, no path could be
/// watched, or writing to stdout fails.
async fn run_watch(config: &Config, paths: &[Utf8PathBuf]) -> color_eyre::Result<()> {
    let mut watcher = FileWatcher::new(&config.watch)?;

    let watched = add_paths(&mut watcher, paths, config.watch.recursive);
    if watched == 0 {
        while let Ok(event) = watcher.try_recv() {
            print_event(&event, config.output)?;
        }
        return Err(color_eyre::eyre::eyre!("None of the given paths could be watched"));
    }

    info!(
        watched,
        directories = watcher.engine().watched_directories().len(),
        files = watcher.engine().watched_files().len(),
        "Watching for changes"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = watcher.recv() => {
                let Some(event) = event else { break };
                print_event(&event, config.output)?;
            }
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    watcher.shutdown();
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
async fn shutdown_signal() -> color_eyre::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C, shutting down");
    }

    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Renders an event, or `None` if the output configuration hides it.
fn render_event(event: &WatchEvent, output: OutputConfig) -> color_eyre::Result<Option<String>> {
    if event.is_immediate() && !output.show_immediate {
        return Ok(None);
    }

    let line = match output.format {
        OutputFormat::Json => serde_json::to_string(event)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize event: {}", e))?,
        _ => event.to_string(),
    };
    Ok(Some(line))
}

/// Writes an event to stdout.
fn print_event(event: &WatchEvent, output: OutputConfig) -> color_eyre::Result<()> {
    let Some(line) = render_event(event, output)? else {
        return Ok(());
    };

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{line}")?;
    handle.flush()?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Merge configuration file and flags
    let config = build_config(&cli)?;

    // 5. Watch until interrupted
    run_watch(&config, &cli.paths).await
}
