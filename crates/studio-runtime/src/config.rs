//! Studio configuration
//!
//! Every subsystem keeps its own config struct with sensible defaults; this
//! aggregates them so a deployment can override any subset from one JSON
//! file. Missing keys fall back to defaults at every level.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use studio_avatar::{ClipLibrary, GazeConfig, MovementConfig, RegistryConfig};
use studio_camera::{AnimatorConfig, DirectorConfig, FocusZone, GafferConfig};
use studio_core::{StudioError, StudioResult};
use studio_life::LifeConfig;
use studio_transport::ChannelConfig;

/// Environment variable overriding `channel.url`
pub const CHANNEL_URL_ENV: &str = "STUDIO_CHANNEL_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Filter used when `STUDIO_LOG` is unset
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub channel: ChannelConfig,
    pub registry: RegistryConfig,
    pub movement: MovementConfig,
    pub gaze: GazeConfig,
    pub life: LifeConfig,
    pub director: DirectorConfig,
    pub animator: AnimatorConfig,
    pub gaffer: GafferConfig,
    pub library: ClipLibrary,
    pub zone: FocusZone,
    pub logging: LoggingConfig,
    /// Root that `avatar_load{local: true}` URLs resolve against
    pub local_asset_root: PathBuf,
    pub tick_interval_ms: u64,
    /// Longest delta a single tick integrates
    pub max_step_ms: u64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            registry: RegistryConfig::default(),
            movement: MovementConfig::default(),
            gaze: GazeConfig::default(),
            life: LifeConfig::default(),
            director: DirectorConfig::default(),
            animator: AnimatorConfig::default(),
            gaffer: GafferConfig::default(),
            library: ClipLibrary::default(),
            zone: FocusZone::default(),
            logging: LoggingConfig::default(),
            local_asset_root: PathBuf::from("assets"),
            tick_interval_ms: 16,
            max_step_ms: 100,
        }
    }
}

impl StudioConfig {
    /// Two-person interview preset
    pub fn interview() -> Self {
        Self {
            registry: RegistryConfig::interview(),
            director: DirectorConfig::documentary(),
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> StudioResult<Self> {
        serde_json::from_str(text).map_err(|e| StudioError::Config(e.to_string()))
    }

    /// Load from a JSON file, then apply environment overrides
    pub fn from_json_file(path: impl AsRef<Path>) -> StudioResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StudioError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_json_str(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(CHANNEL_URL_ENV) {
            if !url.is_empty() {
                self.channel.url = url;
            }
        }
    }

    pub fn validate(&self) -> StudioResult<()> {
        self.channel.validate()?;
        if self.tick_interval_ms == 0 {
            return Err(StudioError::Config("tick_interval_ms must be positive".into()));
        }
        if self.registry.target_height <= 0.0 {
            return Err(StudioError::Config("registry.target_height must be positive".into()));
        }
        if self.movement.speed <= 0.0 {
            return Err(StudioError::Config("movement.speed must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn max_step(&self) -> Duration {
        Duration::from_millis(self.max_step_ms.max(self.tick_interval_ms))
    }

    /// Resolve an avatar URL; local paths are joined onto the asset root
    pub fn resolve_avatar_url(&self, url: &str, local: bool) -> String {
        if local {
            self.local_asset_root
                .join(url.trim_start_matches('/'))
                .to_string_lossy()
                .into_owned()
        } else {
            url.to_string()
        }
    }
}
