//! Configuration file management
//!
//! Loads TOML configuration files and provides application settings.
//! Default config path: ~/.config/gles-triangle/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_FRAME_INTERVAL_MS, DEFAULT_ROTATION_STEP, DEFAULT_SCALE, MAX_FRAME_INTERVAL_MS,
};
use crate::utils::parse_hex_color_to_f32;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "GLES_TRIANGLE_CONFIG";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display settings
    pub display: DisplayOutputConfig,
    /// Render loop settings
    pub render: RenderConfig,
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOutputConfig {
    /// DRM device path (auto-detect if empty)
    pub device: String,
    /// Prefer external connectors (HDMI, DP) over built-in panels (DSI, DPI)
    pub prefer_external: bool,
}

impl Default for DisplayOutputConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            prefer_external: true,
        }
    }
}

/// Render loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Uniform scale applied to the triangle
    pub scale: f32,
    /// Z rotation added each frame (degrees)
    pub rotation_step: f32,
    /// Background color (hex format: "#RRGGBB")
    pub clear_color: String,
    /// Present with page flips and wait for vblank
    pub vsync: bool,
    /// Sleep between frames when vsync is off (milliseconds)
    pub frame_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            rotation_step: DEFAULT_ROTATION_STEP,
            clear_color: "#000000".to_string(),
            vsync: true,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

impl RenderConfig {
    /// Get clear color as RGB (0.0-1.0)
    pub fn clear_rgb(&self) -> (f32, f32, f32) {
        parse_hex_color_to_f32(&self.clear_color).unwrap_or((0.0, 0.0, 0.0))
    }

    /// Replace values the render loop cannot use
    fn sanitize(&mut self) {
        let defaults = Self::default();

        if !self.scale.is_finite() || self.scale <= 0.0 {
            warn!(
                "Invalid render.scale {}, using {}",
                self.scale, defaults.scale
            );
            self.scale = defaults.scale;
        }

        if !self.rotation_step.is_finite() {
            warn!(
                "Invalid render.rotation_step {}, using {}",
                self.rotation_step, defaults.rotation_step
            );
            self.rotation_step = defaults.rotation_step;
        }

        if parse_hex_color_to_f32(&self.clear_color).is_none() {
            warn!(
                "Invalid render.clear_color {:?}, using {}",
                self.clear_color, defaults.clear_color
            );
            self.clear_color = defaults.clear_color;
        }

        if self.frame_interval_ms > MAX_FRAME_INTERVAL_MS {
            warn!(
                "render.frame_interval_ms {} too large, clamping to {}",
                self.frame_interval_ms, MAX_FRAME_INTERVAL_MS
            );
            self.frame_interval_ms = MAX_FRAME_INTERVAL_MS;
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/gles-triangle/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. GLES_TRIANGLE_CONFIG environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
            warn!("{} points to missing file: {}", CONFIG_ENV_VAR, path);
        }

        // 2. User config: ~/.config/gles-triangle/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("gles-triangle").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. GLES_TRIANGLE_CONFIG environment variable
    /// 2. ~/.config/gles-triangle/config.toml (user config)
    /// 3. /etc/gles-triangle/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse settings from TOML text, replacing unusable values with defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.render.sanitize();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(cfg.display.device.is_empty());
        assert!(cfg.display.prefer_external);
        assert_eq!(cfg.render.scale, 0.5);
        assert_eq!(cfg.render.rotation_step, 1.0);
        assert!(cfg.render.vsync);
        assert_eq!(cfg.render.frame_interval_ms, 10);
        assert_eq!(cfg.render.clear_rgb(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty_file_is_default() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.render.scale, 0.5);
        assert!(cfg.display.prefer_external);
    }

    #[test]
    fn test_partial_file() {
        let cfg = Config::from_toml_str(
            r#"
            [display]
            device = "/dev/dri/card1"

            [render]
            rotation_step = -2.5
            vsync = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.display.device, "/dev/dri/card1");
        assert!(cfg.display.prefer_external);
        assert_eq!(cfg.render.rotation_step, -2.5);
        assert!(!cfg.render.vsync);
        assert_eq!(cfg.render.scale, 0.5);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let cfg = Config::from_toml_str(
            r#"
            [render]
            scale = -1.0
            clear_color = "not-a-color"
            frame_interval_ms = 60000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.scale, 0.5);
        assert_eq!(cfg.render.clear_color, "#000000");
        assert_eq!(cfg.render.frame_interval_ms, 1000);
    }

    #[test]
    fn test_non_finite_values_fall_back() {
        let cfg = Config::from_toml_str("[render]\nscale = inf\nrotation_step = nan\n").unwrap();
        assert_eq!(cfg.render.scale, 0.5);
        assert_eq!(cfg.render.rotation_step, 1.0);

        let cfg = Config::from_toml_str("[render]\nscale = 0.0\nrotation_step = -inf\n").unwrap();
        assert_eq!(cfg.render.scale, 0.5);
        assert_eq!(cfg.render.rotation_step, 1.0);
    }

    #[test]
    fn test_clear_color() {
        let cfg = Config::from_toml_str("[render]\nclear_color = \"#ffffff\"\n").unwrap();
        assert_eq!(cfg.render.clear_rgb(), (1.0, 1.0, 1.0));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(Config::from_toml_str("[render\nscale = 1").is_err());
        assert!(Config::from_toml_str("[render]\nscale = \"big\"").is_err());
    }
}
