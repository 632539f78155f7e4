//! PriceLens - live price conversion from camera frames
//!
//! Reads prices through text recognition on a camera stream and converts
//! them with live exchange rates.

mod app;
mod capture;
mod config;
mod controls;
mod error;
mod pipeline;
mod rates;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::PriceLensApp;
use crate::config::AppConfig;
use crate::rates::HttpRateProvider;
use crate::vision::HttpRecognizer;

/// PriceLens - convert prices read from a camera stream
#[derive(Parser, Debug)]
#[command(name = "price-lens")]
#[command(about = "Reads prices from camera frames and converts them at live exchange rates")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of still images to replay as camera frames
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Frames per second delivered by the camera feed
    #[arg(long)]
    fps: Option<u32>,

    /// Source currency code
    #[arg(long)]
    from: Option<String>,

    /// Target currency code
    #[arg(long)]
    to: Option<String>,

    /// Text recognition endpoint
    #[arg(long)]
    ocr_endpoint: Option<String>,

    /// Exchange-rate URL prefix (the base currency code is appended)
    #[arg(long)]
    rates_url: Option<String>,

    /// List supported currencies and exit
    #[arg(long)]
    list_currencies: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = load_or_create_config(args.config.as_deref());
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    // List currencies mode
    if args.list_currencies {
        println!("Supported currencies:");
        for code in &config.currency.supported {
            let marker = match (code == &config.currency.from, code == &config.currency.to) {
                (true, true) => " (from, to)",
                (true, false) => " (from)",
                (false, true) => " (to)",
                (false, false) => "",
            };
            println!("  {}{}", code, marker);
        }
        return Ok(());
    }

    info!("PriceLens starting...");
    let recognizer = HttpRecognizer::new(&config.recognition.endpoint, config.recognition.timeout())?;
    info!("Recognition endpoint: {}", recognizer.endpoint());
    let rates = HttpRateProvider::new(&config.rates.base_url, config.rates.timeout())?;

    let mut app = PriceLensApp::new(config, Arc::new(recognizer), Arc::new(rates))?;
    app.start()?;
    app.run()?;

    info!("PriceLens shutdown complete");

    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&std::path::Path>) -> AppConfig {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => storage::default_config_path().ok(),
    };

    if let Some(config_path) = config_path {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => tracing::warn!("Failed to load {:?}: {}", config_path, e),
            }
        } else if explicit.is_none() {
            if let Err(e) = config::save_config(&AppConfig::default(), &config_path) {
                tracing::warn!("Failed to write default configuration to {:?}: {}", config_path, e);
            } else {
                info!("Wrote default configuration to {:?}", config_path);
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Command-line flags take precedence over the file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(dir) = &args.frames_dir {
        config.capture.frames_dir = Some(dir.clone());
    }
    if let Some(fps) = args.fps {
        config.capture.max_fps = fps;
    }
    if let Some(from) = &args.from {
        config.currency.from = from.to_uppercase();
    }
    if let Some(to) = &args.to {
        config.currency.to = to.to_uppercase();
    }
    if let Some(endpoint) = &args.ocr_endpoint {
        config.recognition.endpoint = endpoint.clone();
    }
    if let Some(url) = &args.rates_url {
        config.rates.base_url = url.clone();
    }
}
