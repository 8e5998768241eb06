use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::Result;

use crate::player::DEFAULT_FRAME_INTERVAL;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub web_port: u16,
    /// Base URL of the camera server the console forwards CRUD requests to
    pub backend_url: String,
    /// Root directory holding one sub-directory of frames per event
    pub frames_dir: PathBuf,

    pub frame_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub command_queue_depth: usize,
    /// Playback sessions nobody has polled for this long are closed
    pub session_idle_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web_port: 8080,
            backend_url: "http://127.0.0.1:8081".to_string(),
            frames_dir: PathBuf::from("frames"),

            frame_interval_ms: DEFAULT_FRAME_INTERVAL.as_millis() as u64,
            request_timeout_ms: 5000,
            command_queue_depth: 64,
            session_idle_timeout_ms: 30_000,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Ok(config_str) = fs::read_to_string(path) {
            let config: AppConfig = serde_json::from_str(&config_str)?;
            return Ok(config);
        }

        // Fall back to default configuration
        tracing::warn!("{} not found, using default configuration", path.display());
        Ok(AppConfig::default())
    }

    /// Like [`AppConfig::load`], but writes the defaults out when there is no
    /// file yet so there is something to edit.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::load(path)?;
        if !path.exists() {
            config.save(path)?;
            tracing::info!("📝 Wrote default configuration to {}", path.display());
        }
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.session_idle_timeout_ms)
    }
}
