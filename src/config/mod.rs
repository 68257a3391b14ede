use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use anyhow::{Context, bail};

use crate::capture::frame_size;
use crate::resources::{DEFAULT_DISK_TOTAL, DEFAULT_MEMORY_TOTAL};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourcesConfig {
    pub memory_total_bytes: u64,
    pub disk_total_bytes: u64,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            memory_total_bytes: DEFAULT_MEMORY_TOTAL,
            disk_total_bytes: DEFAULT_DISK_TOTAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PacerConfig {
    /// 0 keeps the pacer idle until a rate is set.
    pub max_framerate_fps: u32,
    pub start_paused: bool,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            max_framerate_fps: 30,
            start_paused: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    /// Simulated encode time per frame.
    pub encode_delay_ms: u64,
    /// Raw frame size divided by this gives the encoded size.
    pub compression_ratio: u32,
    /// Encoded bytes shipped off the backlog per captured frame.
    pub drain_bytes_per_frame: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            bytes_per_pixel: 4,
            encode_delay_ms: 8,
            compression_ratio: 20,
            drain_bytes_per_frame: 32 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub http_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            http_port: 8087,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub node_name: String,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub pacer: PacerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("parsing config")?;
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_name.trim().is_empty() {
            bail!("node_name must not be empty");
        }

        if self.resources.memory_total_bytes == 0 {
            bail!("resources.memory_total_bytes must be > 0");
        }
        if self.resources.disk_total_bytes == 0 {
            bail!("resources.disk_total_bytes must be > 0");
        }

        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 || capture.bytes_per_pixel == 0 {
            bail!(
                "capture dimensions must be > 0 (got {}x{}x{})",
                capture.width,
                capture.height,
                capture.bytes_per_pixel
            );
        }
        if capture.compression_ratio == 0 {
            bail!("capture.compression_ratio must be > 0");
        }
        let Some(frame_bytes) =
            frame_size(capture.width, capture.height, capture.bytes_per_pixel)
        else {
            bail!(
                "capture dimensions overflow ({}x{}x{})",
                capture.width,
                capture.height,
                capture.bytes_per_pixel
            );
        };
        if frame_bytes > self.resources.memory_total_bytes {
            bail!(
                "a single {} byte frame exceeds resources.memory_total_bytes ({})",
                frame_bytes,
                self.resources.memory_total_bytes
            );
        }

        if self.monitoring.enabled && self.monitoring.http_port == 0 {
            bail!("monitoring.http_port must be > 0");
        }

        Ok(())
    }

    pub fn monitoring_bind(&self) -> String {
        format!("0.0.0.0:{}", self.monitoring.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: "capture-governor".to_string(),
            resources: ResourcesConfig::default(),
            pacer: PacerConfig::default(),
            capture: CaptureConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_sections_fall_back_to_defaults() {
        let config = Config::parse("node_name = \"desk\"\n[pacer]\nmax_framerate_fps = 5\n").unwrap();
        assert_eq!(config.node_name, "desk");
        assert_eq!(config.pacer.max_framerate_fps, 5);
        assert!(!config.pacer.start_paused);
        assert_eq!(config.resources, ResourcesConfig::default());
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_rejects_frame_larger_than_memory() {
        let mut config = Config::default();
        config.resources.memory_total_bytes = 1024;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds resources.memory_total_bytes"));
    }

    #[test]
    fn test_rejects_overflowing_capture_dimensions() {
        let err = Config::parse(
            "[capture]\nwidth = 4000000000\nheight = 4000000000\nbytes_per_pixel = 4000000000\n",
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("capture dimensions overflow"));
    }
}
