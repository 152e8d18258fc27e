//! src/config.rs
//! ============================================================================
//! # Config: Profiler Configuration Loader and Runtime Handle
//!
//! Loads user-editable settings as TOML from the XDG-compliant config path
//! using the [`directories`](https://docs.rs/directories) crate, with robust
//! defaulting when no config file exists. [`ConfigHandle`] is the shared
//! process-wide view: the automatic-capture duration can be changed at any
//! time, and a change never affects an automatic capture already waiting —
//! only future ones.

use std::{path::PathBuf, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

const DEFAULT_AUTO_DURATION: Duration = Duration::from_secs(600);
const DEFAULT_CPU_FREQUENCY_HZ: i32 = 99;

/// User-editable profiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long one automatic capture runs.
    #[serde(with = "humantime_serde")]
    pub auto_duration: Duration,

    /// CPU sampling frequency handed to the engine, in Hz.
    pub cpu_frequency_hz: i32,

    /// Where sink files are written. `None` means the process working
    /// directory, resolved at capture time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_duration: DEFAULT_AUTO_DURATION,
            cpu_frequency_hz: DEFAULT_CPU_FREQUENCY_HZ,
            output_dir: None,
        }
    }
}

impl Config {
    /// Loads config from the TOML file at the XDG-compliant app config dir,
    /// or returns defaults when no file exists.
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(&path).await?;
            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration",
                path.display()
            );

            Ok(Self::default())
        }
    }

    /// Saves config to the TOML file at the XDG-compliant app config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "proftap", "proftap")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

/// Shared, swappable view of the configuration.
///
/// Readers load a consistent snapshot; writers replace the whole config.
/// Cloning the handle shares the same underlying storage.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<Config>>,
}

impl ConfigHandle {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn get(&self) -> Arc<Config> {
        self.inner.load_full()
    }

    #[must_use]
    pub fn auto_duration(&self) -> Duration {
        self.inner.load().auto_duration
    }

    /// Replace the automatic-capture duration for future captures.
    pub fn set_auto_duration(&self, duration: Duration) {
        self.inner.rcu(|current| {
            let mut next = Config::clone(current);
            next.auto_duration = duration;
            next
        });
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
