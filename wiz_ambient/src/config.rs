//! Configuration for the sync tool.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then the
//! `WIZ_BULB_IP` environment variable. Command-line flags are applied on top by
//! the binary.

use crate::capture::Region;
use crate::core_modules::color_selector::ColorMode;
use crate::error::{AmbientError, Result};
use crate::pipeline::{FrameSettings, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides the bulb address.
pub const BULB_IP_ENV: &str = "WIZ_BULB_IP";

pub const DEFAULT_BULB_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 29, 140));

/// Fixed tick of the capture loop. At 10 frames per second the bulb keeps up
/// without dropping packets.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub bulb_ip: IpAddr,
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,
    pub max_attempts: u32,
    pub mode: ColorMode,
    pub brightness: f64,
    pub smoothing: bool,
    pub vibrant: bool,
    /// Capture area; the whole primary monitor when absent.
    pub region: Option<Region>,
    pub pipeline: PipelineConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bulb_ip: DEFAULT_BULB_IP,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            response_timeout: Duration::from_millis(750),
            max_attempts: 3,
            mode: ColorMode::Dominant,
            brightness: 1.0,
            smoothing: true,
            vibrant: false,
            region: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(text).map_err(|e| AmbientError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AmbientError::Config {
            message: format!("reading {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults, overlaid with `path` when given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_value(std::env::var(BULB_IP_ENV).ok().as_deref())?;
        Ok(config)
    }

    fn apply_env_value(&mut self, bulb_ip: Option<&str>) -> Result<()> {
        if let Some(raw) = bulb_ip.map(str::trim).filter(|s| !s.is_empty()) {
            self.bulb_ip = raw
                .parse()
                .map_err(|_| AmbientError::invalid_parameter(BULB_IP_ENV, raw))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(AmbientError::invalid_parameter("brightness", self.brightness));
        }
        if self.update_interval.is_zero() {
            return Err(AmbientError::invalid_parameter(
                "update_interval",
                format!("{:?}", self.update_interval),
            ));
        }
        if self.pipeline.sample_stride == 0 {
            return Err(AmbientError::invalid_parameter("pipeline.sample_stride", 0));
        }
        if self.max_attempts == 0 {
            return Err(AmbientError::invalid_parameter("max_attempts", 0));
        }
        Ok(())
    }

    /// The runtime settings this configuration starts a sync with.
    pub fn frame_settings(&self) -> FrameSettings {
        FrameSettings {
            mode: self.mode,
            smoothing: self.smoothing,
            vibrant: self.vibrant,
            brightness_scale: self.brightness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert_eq!(config.bulb_ip.to_string(), "192.168.29.140");
        assert_eq!(config.update_interval, Duration::from_millis(100));
        assert_eq!(config.mode, ColorMode::Dominant);
        assert!(config.smoothing);
        assert!(!config.vibrant);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            bulb_ip = "10.0.0.7"
            update_interval = "150ms"
            mode = "average"
            brightness = 0.5

            [region]
            left = 0
            top = 0
            width = 640
            height = 360

            [pipeline]
            sample_stride = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.bulb_ip.to_string(), "10.0.0.7");
        assert_eq!(config.update_interval, Duration::from_millis(150));
        assert_eq!(config.mode, ColorMode::Average);
        assert_eq!(config.region.unwrap().to_string(), "640x360 at (0,0)");
        assert_eq!(config.pipeline.sample_stride, 10);
        assert_eq!(config.pipeline.quantize_step, 8);
        assert!(config.smoothing);
    }

    #[test]
    fn out_of_range_brightness_is_rejected() {
        assert!(SyncConfig::from_toml_str("brightness = 1.5").is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(SyncConfig::from_toml_str("update_interval = \"0s\"").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "vibrant = true\nsmoothing = false").unwrap();
        let config = SyncConfig::from_file(file.path()).unwrap();
        assert!(config.vibrant);
        assert!(!config.smoothing);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = SyncConfig::from_file(Path::new("/nonexistent/ambient.toml")).unwrap_err();
        assert!(matches!(err, AmbientError::Config { .. }));
    }

    #[test]
    fn env_value_overrides_ip() {
        let mut config = SyncConfig::default();
        config.apply_env_value(Some(" 192.168.1.20 ")).unwrap();
        assert_eq!(config.bulb_ip.to_string(), "192.168.1.20");
        config.apply_env_value(Some("")).unwrap();
        assert_eq!(config.bulb_ip.to_string(), "192.168.1.20");
        assert!(config.apply_env_value(Some("not-an-ip")).is_err());
    }
}
