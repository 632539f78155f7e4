//! Application Configuration
//!
//! User settings stored in TOML format. Every section and field has a
//! default, so a partial file only overrides what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::vision::Rotation;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera feed settings
    pub capture: CaptureSettings,
    /// Text recognition service
    pub recognition: RecognitionSettings,
    /// Exchange-rate service
    pub rates: RatesSettings,
    /// Currency selection
    pub currency: CurrencySettings,
}

/// Camera feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Directory of still images replayed as camera frames
    pub frames_dir: Option<PathBuf>,
    /// Frames per second delivered by the feed
    pub max_fps: u32,
    /// Restart from the first image after the last
    pub loop_playback: bool,
    /// Rotation reported with each frame (0, 90, 180 or 270)
    pub rotation_degrees: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frames_dir: None,
            max_fps: 15,
            loop_playback: true,
            rotation_degrees: 0,
        }
    }
}

impl CaptureSettings {
    /// Feed configuration, once a frames directory is known
    pub fn to_capture_config(&self) -> Option<CaptureConfig> {
        self.frames_dir.as_ref().map(|dir| CaptureConfig {
            frames_dir: dir.clone(),
            max_fps: self.max_fps,
            loop_playback: self.loop_playback,
            rotation_degrees: self.rotation_degrees,
        })
    }
}

/// Text recognition service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Endpoint frames are posted to
    pub endpoint: String,
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8866/ocr".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl RecognitionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Exchange-rate service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesSettings {
    /// URL prefix; the base currency code is appended
    pub base_url: String,
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for RatesSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchangerate-api.com/v4/latest/".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl RatesSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Currency selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencySettings {
    /// Source currency at startup
    pub from: String,
    /// Target currency at startup
    pub to: String,
    /// Codes the user may select
    pub supported: Vec<String>,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            from: "USD".to_string(),
            to: "USD".to_string(),
            supported: ["USD", "EUR", "JPY", "GBP"].iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capture.max_fps == 0 {
            anyhow::bail!("capture.max_fps must be at least 1");
        }
        Rotation::from_degrees(self.capture.rotation_degrees).context("Invalid capture.rotation_degrees")?;

        let currency = &self.currency;
        if currency.supported.is_empty() {
            anyhow::bail!("currency.supported must list at least one currency");
        }
        for (field, code) in [("from", &currency.from), ("to", &currency.to)] {
            if !currency.supported.contains(code) {
                anyhow::bail!(
                    "currency.{} '{}' is not in currency.supported ({})",
                    field,
                    code,
                    currency.supported.join(", ")
                );
            }
        }
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
