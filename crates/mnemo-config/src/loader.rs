use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::schema::MnemoConfig;

/// Loads and optionally hot-reloads the mnemo configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<MnemoConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > MNEMO_CONFIG env > ~/.mnemo/mnemo.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("MNEMO_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemo")
            .join("mnemo.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> mnemo_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            MnemoConfig::default()
        };

        let config = Self::apply_env_overrides(config);
        Self::check(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Parse a TOML document into a config.
    pub fn parse(raw: &str, origin: &Path) -> mnemo_core::Result<MnemoConfig> {
        toml::from_str::<MnemoConfig>(raw).map_err(|e| {
            mnemo_core::MnemoError::Config(format!("failed to parse {}: {}", origin.display(), e))
        })
    }

    /// Validate config: log warnings, fail on errors.
    fn check(config: &MnemoConfig) -> mnemo_core::Result<()> {
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
                Ok(())
            }
            Err(e) => Err(mnemo_core::MnemoError::Config(e)),
        }
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> MnemoConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for subscription.
    pub fn shared(&self) -> Arc<RwLock<MnemoConfig>> {
        Arc::clone(&self.config)
    }

    /// Path being watched.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (MNEMO_LOG_LEVEL, MNEMO_WORKING_CAPACITY, etc.)
    fn apply_env_overrides(mut config: MnemoConfig) -> MnemoConfig {
        if let Ok(v) = std::env::var("MNEMO_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("MNEMO_WORKING_CAPACITY") {
            match v.parse::<usize>() {
                Ok(capacity) => config.working.capacity = capacity,
                Err(_) => warn!(value = %v, "ignoring non-numeric MNEMO_WORKING_CAPACITY"),
            }
        }
        if let Ok(v) = std::env::var("MNEMO_MAX_EPISODES") {
            match v.parse::<usize>() {
                Ok(max) => config.episodic.max_episodes = max,
                Err(_) => warn!(value = %v, "ignoring non-numeric MNEMO_MAX_EPISODES"),
            }
        }
        if let Ok(v) = std::env::var("MNEMO_CONSOLIDATION_THRESHOLD") {
            match v.parse::<f64>() {
                Ok(threshold) => config.coordinator.consolidation_threshold = threshold,
                Err(_) => warn!(value = %v, "ignoring non-numeric MNEMO_CONSOLIDATION_THRESHOLD"),
            }
        }
        config
    }

    /// Reload the config from disk. The current config is kept if the new one is invalid.
    pub fn reload(&self) -> mnemo_core::Result<()> {
        if !self.config_path.exists() {
            return Err(mnemo_core::MnemoError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let raw = std::fs::read_to_string(&self.config_path)?;
        let new_config = Self::parse(&raw, &self.config_path)?;
        let new_config = Self::apply_env_overrides(new_config);
        Self::check(&new_config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }

    /// Start a background file watcher that reloads when the config file changes.
    /// Returns a handle to the watcher (must be kept alive for watching to continue).
    pub fn watch(&self) -> mnemo_core::Result<notify::RecommendedWatcher> {
        let config = Arc::clone(&self.config);
        let config_path = self.config_path.clone();

        info!(?config_path, "starting config file watcher");

        let path_for_event = config_path.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let is_our_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == path_for_event.file_name());
                    if !is_our_file {
                        return;
                    }

                    info!("config file changed, reloading");
                    let raw = match std::fs::read_to_string(&path_for_event) {
                        Ok(raw) => raw,
                        Err(e) => {
                            warn!(error = %e, "failed to read config file during hot-reload");
                            return;
                        }
                    };
                    let parsed = ConfigLoader::parse(&raw, &path_for_event)
                        .map(ConfigLoader::apply_env_overrides)
                        .and_then(|c| ConfigLoader::check(&c).map(|_| c));
                    match parsed {
                        Ok(new_config) => {
                            *config.write() = new_config;
                            info!("configuration hot-reloaded successfully");
                        }
                        Err(e) => {
                            warn!(error = %e, "config file has errors, keeping current config");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "file watcher error");
                }
            },
        )
        .map_err(|e| {
            mnemo_core::MnemoError::Config(format!("failed to create file watcher: {}", e))
        })?;

        // Watch the parent directory (some editors create temp files + rename)
        let watch_path = self.config_path.parent().unwrap_or(Path::new("."));
        watcher
            .watch(watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| {
                mnemo_core::MnemoError::Config(format!("failed to watch config directory: {}", e))
            })?;

        Ok(watcher)
    }
}
