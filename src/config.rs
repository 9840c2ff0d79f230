//! Configuration parsing and management for Kagami

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::avatar::AvatarDescriptor;
use crate::error::{ConfigError, KagamiError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mirror mode: flips left/right channels and yaw/roll signs to match a
    /// mirrored camera view
    pub mirror: bool,
    pub canvas: CanvasConfig,
    pub head_offset: HeadOffset,
    pub avatar: AvatarDescriptor,
    pub tracker: TrackerConfig,
    pub driver: DriverConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror: false,
            canvas: CanvasConfig::default(),
            head_offset: HeadOffset::default(),
            avatar: AvatarDescriptor::default(),
            tracker: TrackerConfig::default(),
            driver: DriverConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KagamiError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, KagamiError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, KagamiError> {
        // Try config paths in order
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), KagamiError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "canvas".to_string(),
                message: "Canvas dimensions must be greater than 0".to_string(),
            }
            .into());
        }

        if !(1..=240).contains(&self.driver.fps) {
            return Err(ConfigError::InvalidValue {
                field: "driver.fps".to_string(),
                message: "Frame rate must be between 1 and 240".to_string(),
            }
            .into());
        }

        self.avatar.validate()?;

        if !matches!(self.tracker.video.rotate, 0 | 90 | -90 | 180) {
            return Err(ConfigError::InvalidValue {
                field: "tracker.video.rotate".to_string(),
                message: "Rotation must be one of 0, 90, -90, 180".to_string(),
            }
            .into());
        }

        if self.tracker.auto_launch {
            let path = std::path::Path::new(&self.tracker.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "Tracker auto_launch enabled but tracker script not found at: {}",
                    self.tracker.tracker_script
                );
            }
        }

        // Validate HTTP settings
        if self.http.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Output canvas dimensions, forwarded to external renderers
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Constant rotation offset added to the tracked head pose, in radians
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadOffset {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Face tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Enable the face tracker receiver
    pub enabled: bool,
    /// UDP port to receive tracker data on
    pub port: u16,
    /// Listen address for UDP socket
    pub listen_address: String,
    /// Neural-network model file handed to the external tracker
    pub model_path: String,
    /// Auto-launch the external tracker subprocess
    pub auto_launch: bool,
    /// Interpreter used to launch the tracker script
    pub tracker_command: String,
    /// Path to the tracker script
    pub tracker_script: String,
    /// Auto-restart subprocess on crash
    pub auto_restart: bool,
    /// Delay before restarting crashed subprocess (seconds)
    pub restart_delay_secs: u64,
    /// Camera/video negotiation settings forwarded to the tracker
    pub video: VideoSettings,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 12400,
            listen_address: "127.0.0.1".to_string(),
            model_path: "assets/face_transfer_nn.json".to_string(),
            auto_launch: false,
            tracker_command: "python3".to_string(),
            tracker_script: "scripts/face_tracker.py".to_string(),
            auto_restart: true,
            restart_delay_secs: 3,
            video: VideoSettings::default(),
        }
    }
}

/// Camera capture settings recognized by the external tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Capture device id (not set by default; the tracker picks one)
    pub device_id: Option<String>,
    /// "user" for the front camera, "environment" for the rear
    pub facing_mode: String,
    /// Ideal video width in pixels
    pub ideal_width: u32,
    /// Ideal video height in pixels
    pub ideal_height: u32,
    /// Min video width in pixels
    pub min_width: u32,
    /// Min video height in pixels
    pub min_height: u32,
    /// Max video width in pixels
    pub max_width: u32,
    /// Max video height in pixels
    pub max_height: u32,
    /// Rotation in degrees, possible values: 0, 90, -90, 180
    pub rotate: i32,
    /// Flip the video horizontally
    pub flip_x: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            device_id: None,
            facing_mode: "user".to_string(),
            ideal_width: 800,
            ideal_height: 600,
            min_width: 480,
            min_height: 480,
            max_width: 1280,
            max_height: 1280,
            rotate: 0,
            flip_x: false,
        }
    }
}

/// Frame driver configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Ticks per second (host-refresh analog)
    pub fps: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { fps: 60 }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable HTTP server
    pub enabled: bool,
    /// HTTP server host
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_enabled: true,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("kagami");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/kagami");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/kagami");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("kagami");
        }
    }

    PathBuf::from(".")
}
