//! # Karuku - Main Entry Point
//!
//! ## Responsibilities:
//! - Parses the command line with `clap`
//! - Sets up `tracing` logging (INFO, or DEBUG with `--verbose`)
//! - Dispatches to watching, history, configuration edits and tool setup
//!
//! ## Usage:
//! ```bash
//! karuku                       # watch, if autoStart is on
//! karuku watch --verbose
//! karuku add ~/Pictures/Screenshots --pattern '^Screen.*\.png$'
//! karuku resize 0.5
//! karuku logs --limit 20
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use karuku::file_manager::FileManager;
use karuku::image_processor::PNGQUANT;
use karuku::installer::{InstallProgress, InstallProgressCallback, Installer};
use karuku::progress::ProgressManager;
use karuku::{ConfigStore, ImageOptimizer, Orchestrator};

#[derive(Parser)]
#[command(name = "karuku")]
#[command(about = "Watch folders for new screenshots and shrink them with pngquant")]
struct Args {
    /// Directory holding config.json and processed_files.log
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the enabled directories until Ctrl-C
    Watch,
    /// Show recent processing history
    Logs {
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// One JSON record per line
        #[arg(long)]
        json: bool,
    },
    /// List watched directories
    List,
    /// Watch another directory
    Add {
        directory: PathBuf,
        /// `*.png` or a regular expression over the file name
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// Stop watching a directory
    Remove { id: String },
    Enable { id: String },
    Disable { id: String },
    /// Change the file pattern of a watch
    Pattern { id: String, pattern: String },
    /// Resize ratio in (0, 1], or "off"
    Resize { ratio: String },
    Notifications {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Report where pngquant was found
    Check,
    /// Install pngquant with the system package manager
    Install,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => ConfigStore::default_dir()?,
    };

    match args.command {
        None => {
            let config = ConfigStore::new(&config_dir).load().await?;
            if !config.auto_start {
                info!("Auto start is off; run `karuku watch` to start watching");
                return Ok(());
            }
            watch(&config_dir).await
        }
        Some(Command::Watch) => watch(&config_dir).await,
        Some(Command::Logs { limit, json }) => show_logs(&config_dir, limit, json).await,
        Some(Command::List) => {
            let orchestrator = Orchestrator::load(&config_dir).await?;
            let config = orchestrator.config();
            for watch in &config.watch_configs {
                println!(
                    "{} {}  {}  [{}]",
                    if watch.enabled { "●" } else { "○" },
                    watch.id,
                    watch.path.display(),
                    watch.pattern
                );
            }
            println!(
                "notifications: {} | auto start: {} | resize: {}",
                on_off(config.notifications),
                on_off(config.auto_start),
                config
                    .resize_ratio
                    .map(|ratio| ratio.to_string())
                    .unwrap_or_else(|| "off".to_string())
            );
            Ok(())
        }
        Some(Command::Add { directory, pattern }) => {
            let mut orchestrator = Orchestrator::load(&config_dir).await?;
            let watch = orchestrator.add_watch_dir(&directory, pattern.as_deref()).await?;
            println!("Added {} ({})", watch.path.display(), watch.id);
            Ok(())
        }
        Some(Command::Remove { id }) => {
            let mut orchestrator = Orchestrator::load(&config_dir).await?;
            let removed = orchestrator.remove_watch(&id).await?;
            println!("Removed {}", removed.path.display());
            Ok(())
        }
        Some(Command::Enable { id }) => Orchestrator::load(&config_dir).await?.set_enabled(&id, true).await,
        Some(Command::Disable { id }) => Orchestrator::load(&config_dir).await?.set_enabled(&id, false).await,
        Some(Command::Pattern { id, pattern }) => {
            Orchestrator::load(&config_dir).await?.set_pattern(&id, &pattern).await
        }
        Some(Command::Resize { ratio }) => {
            let ratio = parse_ratio(&ratio)?;
            Orchestrator::load(&config_dir).await?.set_resize_ratio(ratio).await
        }
        Some(Command::Notifications { state }) => {
            Orchestrator::load(&config_dir)
                .await?
                .set_notifications(matches!(state, Switch::On))
                .await
        }
        Some(Command::Check) => {
            let optimizer = ImageOptimizer::new(&config_dir);
            print!("{}", optimizer.tools_report().await);
            Ok(())
        }
        Some(Command::Install) => install().await,
    }
}

async fn watch(config_dir: &std::path::Path) -> Result<()> {
    let mut orchestrator = Orchestrator::load(config_dir).await?;

    if !orchestrator.tools_ready().await {
        warn!("{} is missing; files will be logged as failed until it is installed", PNGQUANT);
    }

    if orchestrator.start().await == 0 {
        warn!("No directory is being watched");
    }

    tokio::signal::ctrl_c().await?;
    let stats = orchestrator.shutdown().await;
    println!("\n{}", stats.format_summary());
    Ok(())
}

async fn show_logs(config_dir: &std::path::Path, limit: usize, json: bool) -> Result<()> {
    let optimizer = ImageOptimizer::new(config_dir);
    let records = optimizer.get_processed_files(limit).await;

    if json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    if records.is_empty() {
        println!("No files processed yet");
        return Ok(());
    }

    for record in &records {
        let name = record
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let time = record.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S");
        if record.success {
            println!(
                "{}  ✅ {}  {} → {} ({:.1}%)",
                time,
                name,
                FileManager::format_size(record.original_size),
                FileManager::format_size(record.optimized_size),
                record.reduction_percent()
            );
        } else {
            println!("{}  ❌ {}  {}", time, name, record.error.as_deref().unwrap_or("unknown error"));
        }
    }
    Ok(())
}

async fn install() -> Result<()> {
    let progress = ProgressManager::new();
    let bar = progress.clone();
    let callback: InstallProgressCallback = Arc::new(move |event: &InstallProgress| {
        bar.update(event.progress, &event.message);
    });

    let result = Installer::for_tool(PNGQUANT).with_progress(callback).install().await;
    if result.success {
        progress.finish(&result.message);
        Ok(())
    } else {
        progress.abandon(&result.message);
        Err(anyhow::anyhow!(
            "{}{}",
            result.message,
            result.details.map(|details| format!(": {}", details)).unwrap_or_default()
        ))
    }
}

fn parse_ratio(value: &str) -> Result<Option<f64>> {
    if value.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let ratio: f64 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("Resize ratio must be a number in (0, 1] or \"off\", got {}", value))?;
    Ok(Some(ratio))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
