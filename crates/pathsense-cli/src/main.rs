//! `pathsense` – command-line front end for the obstacle perception pipeline.
//!
//! 1. Loads `~/.pathsense/config.toml` (or defaults) plus `PATHSENSE_*`
//!    environment overrides.
//! 2. `detect` analyses one or more frames concurrently through a single
//!    pipeline, so every outbound call shares the same throttle.  Each
//!    result is printed as the JSON envelope the mobile client consumes,
//!    followed by any spoken alert.
//! 3. `health` reports whether a Vision API key is configured.
//! 4. `config show|init` prints or writes the configuration file.

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use colored::Colorize;
use futures_util::future::join_all;
use pathsense_perception::{AlertGate, ObstaclePipeline};
use pathsense_types::DetectionResult;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pathsense", version, about = "Obstacle perception for mobility assistance")]
struct Args {
    /// Config file (defaults to ~/.pathsense/config.toml)
    #[arg(long, env = "PATHSENSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse camera frames and print the detected obstacles
    Detect {
        /// Image files (JPEG, PNG, ...)
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Objects and labels requested per frame (overrides config)
        #[arg(long)]
        max_results: Option<u32>,
    },

    /// Report pipeline health without calling the Vision API
    Health,

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = telemetry::init_tracing("pathsense");

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let path = args.config.unwrap_or_else(config::config_path);

    match args.command {
        Command::Config {
            action: ConfigAction::Init { force },
        } => init_config(&path, force),
        Command::Config {
            action: ConfigAction::Show,
        } => {
            let cfg = config::load_or_default(&path)?;
            println!("  Config file: {}", path.display().to_string().bold());
            println!("  {:#?}", cfg);
            Ok(())
        }
        Command::Health => {
            let cfg = config::load_or_default(&path)?;
            let pipeline = ObstaclePipeline::from_config(&cfg.pipeline_config());
            let health = pipeline.health();
            println!(
                "{}",
                serde_json::to_string_pretty(&health).map_err(|e| e.to_string())?
            );
            if !health.api_key_configured {
                warn!("no Vision API key configured; detection will degrade on every frame");
            }
            Ok(())
        }
        Command::Detect {
            images,
            max_results,
        } => {
            let cfg = config::load_or_default(&path)?;
            let max_results = max_results.unwrap_or(cfg.max_results);
            let runtime = tokio::runtime::Runtime::new()
                .map_err(|e| format!("Failed to start async runtime: {}", e))?;
            runtime.block_on(detect_frames(&cfg, images, max_results))
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    config::save_to(&config::Config::default(), path)?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

async fn detect_frames(
    cfg: &config::Config,
    images: Vec<PathBuf>,
    max_results: u32,
) -> Result<(), String> {
    let pipeline = ObstaclePipeline::from_config(&cfg.pipeline_config());
    let pipeline = &pipeline;
    info!(frames = images.len(), max_results, "analysing frames");

    let tasks = images.into_iter().map(|image_path| async move {
        // An unreadable file is just another degraded frame.
        let result = match tokio::fs::read(&image_path).await {
            Ok(bytes) => pipeline.detect(&bytes, max_results).await,
            Err(e) => DetectionResult::Degraded(format!(
                "Failed to read {}: {}",
                image_path.display(),
                e
            )),
        };
        (image_path, result)
    });

    let mut gate = AlertGate::default();
    for (image_path, result) in join_all(tasks).await {
        let marker = if result.is_success() {
            "✓".green().bold()
        } else {
            "✗".yellow().bold()
        };
        println!("{} {}", marker, image_path.display().to_string().bold());
        println!(
            "{}",
            serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?
        );
        if let Some(sentence) = gate.announcement(result.obstacles(), Instant::now()) {
            println!("  {} {}", "alert:".red().bold(), sentence);
        }
    }
    Ok(())
}
