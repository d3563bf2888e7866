use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

use super::alerts::filter::DEFAULT_CACHE_CAPACITY;
use super::alerts::model::DEFAULT_COPY_WINDOW;
use super::sound::{self, SoundResolver};

/// Key the alert collection is stored under.
pub const DEFAULT_STORE_KEY: &str = "alerts_saved";

/// Application settings. Missing fields take their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directories searched for relative sound names, in order.
    pub sound_search_path: Vec<PathBuf>,
    /// Window that `copy on` copies to.
    pub copy_window: String,
    /// Per-alert nick filter memo size.
    pub filter_cache_capacity: usize,
    pub store_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_search_path: sound::default_search_path(),
            copy_window: DEFAULT_COPY_WINDOW.to_string(),
            filter_cache_capacity: DEFAULT_CACHE_CAPACITY,
            store_key: DEFAULT_STORE_KEY.to_string(),
        }
    }
}

impl Settings {
    pub fn sound_resolver(&self) -> SoundResolver {
        SoundResolver::new(
            self.sound_search_path
                .iter()
                .map(|path| PathBuf::from(sound::expand_path(&path.to_string_lossy())))
                .collect(),
        )
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            match fs::read_to_string(&self.config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => log::warn!(
                        "Ignoring malformed {}: {}",
                        self.config_path.display(),
                        e
                    ),
                },
                Err(e) => log::warn!("Failed to read {}: {}", self.config_path.display(), e),
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}
