//! Application Configuration
//!
//! Persistent settings for the ticket scanner.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_API_BASE;
use crate::media::{FacingMode, StreamRequest};
use crate::scanner::InversionMode;

/// Environment variable overriding [`Settings::api_base`]
pub const API_BASE_ENV: &str = "API_BASE_URL";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the ticketing API
    pub api_base: String,

    /// Camera preferences
    pub camera: CameraSettings,

    /// Delay between frame captures while no code is found
    pub scan_interval_ms: u64,

    /// Light-on-dark code handling
    pub inversion: InversionMode,

    /// Mark valid tickets used right after verification
    pub auto_mark_used: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            camera: CameraSettings::default(),
            scan_interval_ms: 33, // ~30 fps
            inversion: InversionMode::DontInvert,
            auto_mark_used: false,
        }
    }
}

/// Camera settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Preferred camera
    pub facing: FacingMode,

    /// Ideal capture width
    pub ideal_width: u32,

    /// Ideal capture height
    pub ideal_height: u32,

    /// Target capture FPS
    pub fps: u32,

    /// Pin a specific device instead of matching by facing mode
    pub device_index: Option<u32>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            fps: 30,
            device_index: None,
        }
    }
}

impl CameraSettings {
    /// Constrained request for the first acquisition attempt
    pub fn stream_request(&self) -> StreamRequest {
        StreamRequest::preferred(self.facing, (self.ideal_width, self.ideal_height), self.fps)
            .with_device(self.device_index)
    }
}

impl Settings {
    /// Get settings file path
    pub fn file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ticket-scanner").join("settings.json"))
    }

    /// Load settings from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::file_path().ok_or_else(|| anyhow::anyhow!("No config directory"))?;
        let mut settings = Self::load_from(&path)?;
        settings.apply_env(std::env::var(API_BASE_ENV).ok());
        Ok(settings)
    }

    /// Load settings from a specific file; defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::file_path().ok_or_else(|| anyhow::anyhow!("No config directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Apply the `API_BASE_URL` override, ignoring blank values
    pub fn apply_env(&mut self, api_base: Option<String>) {
        if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
            self.api_base = base.trim().to_string();
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}
