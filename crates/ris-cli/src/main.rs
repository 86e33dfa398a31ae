mod server;
mod transport;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ris_core::{
    Codebook, CodebookSource, CycleDriver, FrameFormat, build_codebook_with, duplicate_phases,
    to_bits,
};
use ris_store::{CodebookStore, RisConfig, data_dir, read_table_file, write_table_file};
use tokio_util::sync::CancellationToken;

use crate::transport::{HttpTransport, StdoutTransport};

#[derive(Parser)]
#[command(name = "ris", about = "RIS beam steering: codebook builder and frame driver")]
struct Cli {
    /// Config file (defaults to $RIS_CONFIG, then <data dir>/ris.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Always rebuild the codebook instead of using the cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the next frame(s) of the cycle
    Frame {
        /// Number of consecutive frames to print
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Output format (decimal or hex)
        #[arg(long)]
        format: Option<FrameFormat>,

        /// Steering angle override in degrees
        #[arg(long, allow_hyphen_values = true)]
        angle: Option<f64>,
    },

    /// Serve frames over HTTP (GET /frame, GET /status, POST /steering)
    Serve {
        /// Listen address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Push a frame to the board on a fixed interval
    Push {
        /// Board endpoint; frames go to stdout when unset
        #[arg(long)]
        url: Option<String>,

        /// Seconds between frames
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Stop after this many frames
        #[arg(long)]
        cycles: Option<usize>,
    },

    /// Show codebook statistics and entries
    Codebook {
        /// Write the codebook as a table file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Import a codebook table file into the cache
    Import {
        /// Input file path
        path: PathBuf,
    },

    /// Inspect or prune the codebook cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached codebooks
    List,

    /// Remove the cached codebook for the configured parameters
    Remove {
        /// Remove the imported table instead of the generated codebook
        #[arg(long)]
        imported: bool,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config =
        RisConfig::discover(cli.config.as_deref(), &data_dir()).context("failed to load config")?;

    match &cli.command {
        Commands::Frame {
            count,
            format,
            angle,
        } => {
            if let Some(format) = format {
                config.frame_format = *format;
            }
            if let Some(angle) = angle {
                if !config.sweep_angles.is_empty() {
                    bail!("--angle cannot override the configured sweep_angles schedule");
                }
                config.steering_angle = *angle;
            }
            cmd_frame(&cli, &config, *count)
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.transport.bind = bind.clone();
            }
            cmd_serve(&cli, &config).await
        }
        Commands::Push {
            url,
            interval_secs,
            cycles,
        } => {
            if url.is_some() {
                config.transport.url = url.clone();
            }
            if let Some(secs) = interval_secs {
                config.transport.interval_secs = *secs;
            }
            cmd_push(&cli, &config, *cycles).await
        }
        Commands::Codebook { export } => cmd_codebook(&cli, &config, export.as_deref()),
        Commands::Import { path } => cmd_import(path),
        Commands::Cache { action } => cmd_cache(&config, action),
    }
}

// ---------------------------------------------------------------------------
// Codebook and driver setup
// ---------------------------------------------------------------------------

fn open_store() -> Result<CodebookStore> {
    CodebookStore::open_in(&data_dir()).context("failed to open codebook cache")
}

/// Table file if configured, else an imported table if requested, else the
/// cache, else a fresh build.
fn load_codebook(cli: &Cli, config: &RisConfig) -> Result<Codebook> {
    if let Some(table) = &config.codebook.table {
        return read_table_file(table)
            .with_context(|| format!("build stage: failed to load table {}", table.display()));
    }

    if config.codebook.imported {
        let key = config.codebook_key(CodebookSource::Table);
        return open_store()?
            .load(&key)
            .context("build stage: failed to load imported table")?
            .with_context(|| format!("build stage: no imported table cached as {}", key.id()));
    }

    let states = config
        .phase_state_set()
        .context("build stage: invalid phase states")?;

    if config.codebook.cache && !cli.no_cache {
        return open_store()?
            .get_or_build(
                &states,
                config.element_count,
                config.threshold,
                config.weighting,
            )
            .context("build stage: failed to build codebook");
    }

    build_codebook_with(
        &states,
        config.element_count,
        config.threshold,
        config.weighting,
    )
    .context("build stage: failed to build codebook")
}

fn build_driver(cli: &Cli, config: &RisConfig) -> Result<CycleDriver> {
    let codebook = load_codebook(cli, config)?;
    let driver_config = config
        .driver_config()
        .context("build stage: invalid driver configuration")?;
    CycleDriver::new(driver_config, codebook).context("build stage: driver rejected codebook")
}

// ---------------------------------------------------------------------------
// Advisory pidfile for observability
// ---------------------------------------------------------------------------

fn pidfile_path() -> PathBuf {
    data_dir().join("ris-serve.pid")
}

/// Check for an existing pidfile and log accordingly, then write our own.
fn acquire_pidfile() -> Option<PathBuf> {
    let path = pidfile_path();
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!("another ris serve (PID {pid}) is running");
        } else {
            tracing::info!("cleaned up stale pidfile (PID {pid} is dead)");
            let _ = std::fs::remove_file(&path);
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            tracing::info!("wrote pidfile: {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

fn release_pidfile(path: &Path) {
    let _ = std::fs::remove_file(path);
    tracing::info!("removed pidfile: {}", path.display());
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_frame(cli: &Cli, config: &RisConfig, count: usize) -> Result<()> {
    let mut driver = build_driver(cli, config)?;
    let schedule_len = driver.config().schedule.len();
    for _ in 0..count {
        let cycle = driver
            .next_cycle()
            .context("match stage: failed to compute frame")?;
        transport::log_cycle(&cycle, schedule_len);
        println!("{}", cycle.frame);
    }
    Ok(())
}

async fn cmd_serve(cli: &Cli, config: &RisConfig) -> Result<()> {
    let driver = build_driver(cli, config)?;
    let pidfile = acquire_pidfile();

    let shutdown = CancellationToken::new();
    server::cancel_on_signal(shutdown.clone());
    let result = server::serve(driver, &config.transport.bind, shutdown)
        .await
        .context("deliver stage: frame server failed");

    if let Some(path) = pidfile {
        release_pidfile(&path);
    }
    result
}

async fn cmd_push(cli: &Cli, config: &RisConfig, cycles: Option<usize>) -> Result<()> {
    let mut driver = build_driver(cli, config)?;
    let interval = Duration::from_secs(config.transport.interval_secs);
    let shutdown = CancellationToken::new();
    server::cancel_on_signal(shutdown.clone());

    let summary = match &config.transport.url {
        Some(url) => {
            let transport = HttpTransport::new(
                url,
                Duration::from_millis(config.transport.timeout_ms),
            )?;
            tracing::info!("pushing frames to {url} every {interval:?}");
            transport::run_push(&mut driver, Arc::new(transport), interval, cycles, shutdown)
                .await?
        }
        None => {
            transport::run_push(&mut driver, Arc::new(StdoutTransport), interval, cycles, shutdown)
                .await?
        }
    };

    eprintln!(
        "pushed {} frames: {} delivered, {} failed",
        summary.cycles, summary.delivered, summary.failed
    );
    Ok(())
}

fn cmd_codebook(cli: &Cli, config: &RisConfig, export: Option<&Path>) -> Result<()> {
    let codebook = load_codebook(cli, config)?;
    let stats = codebook.stats();
    let rule = config.bit_policy.resolve(codebook.phase_states());

    println!("key:        {}", codebook.key().id());
    println!("source:     {}", codebook.source().as_str());
    println!("total:      {}", stats.total_combinations);
    println!("retained:   {}", stats.retained);
    if let (Some(min), Some(max)) = (stats.min_magnitude, stats.max_magnitude) {
        println!("magnitude:  min={min:.4}, max={max:.4}");
    }

    for entry in codebook.entries() {
        println!(
            "  #{:<4} phase={:>8.3}°  |AF|={:.4}  bits={:<4} states={:?}",
            entry.index,
            entry.phase,
            entry.magnitude,
            to_bits(entry, rule),
            entry.states
        );
    }

    let duplicates = duplicate_phases(&codebook);
    if !duplicates.is_empty() {
        println!("duplicate phases (first entry wins):");
        for (first, second) in duplicates {
            println!("  #{first} == #{second}");
        }
    }

    if let Some(path) = export {
        write_table_file(&codebook, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("exported to {}", path.display());
    }
    Ok(())
}

fn cmd_import(path: &Path) -> Result<()> {
    let codebook = open_store()?
        .import_table_file(path)
        .with_context(|| format!("failed to import {}", path.display()))?;

    println!(
        "imported {} entries from {} as {}",
        codebook.len(),
        path.display(),
        codebook.key().id()
    );
    Ok(())
}

fn cmd_cache(config: &RisConfig, action: &CacheAction) -> Result<()> {
    let store = open_store()?;
    match action {
        CacheAction::List => {
            let cached = store.list().context("failed to list codebook cache")?;
            if cached.is_empty() {
                println!("cache is empty");
            }
            for c in cached {
                println!(
                    "{:<9} {}/{:<6} {}  {}",
                    c.source.as_str(),
                    c.retained,
                    c.total,
                    c.created_at,
                    c.key
                );
            }
        }
        CacheAction::Remove { imported } => {
            let source = if *imported {
                CodebookSource::Table
            } else {
                CodebookSource::Generated
            };
            let key = config.codebook_key(source);
            if store.remove(&key).context("failed to prune codebook cache")? {
                println!("removed {}", key.id());
            } else {
                println!("not cached: {}", key.id());
            }
        }
    }
    Ok(())
}
