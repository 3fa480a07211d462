use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "graycode_capture.toml";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5016;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub settle_ms: u64,
    pub auto_arm: AutoArmPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub pattern_dir: PathBuf,
    pub output_root: PathBuf,
    pub session_prefix: String,
    pub config_file: PathBuf,
}

/// When the controller touches the remote device's armed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoArmPolicy {
    /// Never query or change the armed state.
    Never,
    /// Arm before a capture if needed, and revert right after that capture.
    IfNotArmed,
    /// Keep the device armed for the whole session, revert once at the end.
    Always,
}

impl AutoArmPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            AutoArmPolicy::Never => "never",
            AutoArmPolicy::IfNotArmed => "if_not_armed",
            AutoArmPolicy::Always => "always",
        }
    }
}

impl Default for AutoArmPolicy {
    fn default() -> Self {
        AutoArmPolicy::IfNotArmed
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                request_timeout_ms: 10_000,
            },
            capture: CaptureConfig {
                settle_ms: 600,
                auto_arm: AutoArmPolicy::default(),
            },
            display: DisplayConfig {
                fullscreen: true,
                width: 1920,
                height: 1080,
            },
            paths: PathConfig {
                pattern_dir: PathBuf::from("graycode_pattern"),
                output_root: PathBuf::from("."),
                session_prefix: "capture".to_string(),
                config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            log::info!("Config file not found, creating default configuration");
            let default_config = Self::default();
            default_config.save()?;
            Ok(default_config)
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| "Failed to parse configuration file")?;

        log::info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_file(&self.paths.config_file)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
            }
        }

        std::fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(anyhow::anyhow!("Device host must not be empty"));
        }

        if self.device.port == 0 {
            return Err(anyhow::anyhow!("Invalid device port: 0"));
        }

        if self.device.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Request timeout must be positive"));
        }

        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow::anyhow!("Invalid display dimensions"));
        }

        let prefix = &self.paths.session_prefix;
        if prefix.is_empty() || prefix.contains('/') || prefix.contains('\\') {
            return Err(anyhow::anyhow!("Invalid session prefix: {:?}", prefix));
        }

        Ok(())
    }

    /// Applies the positional `[host] [port]` command line overrides.
    pub fn apply_target(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.device.host = host;
        }
        if let Some(port) = port {
            self.device.port = port;
        }
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.capture.settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.device.request_timeout_ms)
    }

    pub fn target_address(&self) -> (String, u16) {
        (self.device.host.clone(), self.device.port)
    }
}
