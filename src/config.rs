//! User configuration and on-disk layout.
//!
//! `config.toml` lives under `~/.config/reprise`; the data artifacts
//! (index, stats, reports, selections, exports) live under a data
//! directory that defaults to `~/.config/reprise/data` and can be
//! overridden in the config or on the command line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::matching::DEFAULT_TOLERANCE;

/// User-editable configuration (read-only after load),
/// stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Music library roots scanned by default.
    #[serde(default)]
    pub music_roots: Vec<PathBuf>,
    /// Duration tolerance in seconds for matching.
    #[serde(default = "default_tolerance")]
    pub duration_tolerance: u32,
    /// Override for the data directory (index, reports, exports).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_tolerance() -> u32 {
    DEFAULT_TOLERANCE
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            music_roots: Vec::new(),
            duration_tolerance: DEFAULT_TOLERANCE,
            data_dir: None,
        }
    }
}

pub struct AppConfig; // Namespace only

impl AppConfig {
    pub fn config_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let dir = home.join(".config").join("reprise");

        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        dir
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the config, writing a default `config.toml` on first run.
    /// A malformed file falls back to defaults rather than failing launch.
    pub fn load() -> UserConfig {
        let path = Self::config_path();

        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => toml::from_str(&content).unwrap_or_else(|_| UserConfig::default()),
                Err(_) => UserConfig::default(),
            }
        } else {
            let config = UserConfig::default();
            if let Ok(content) = toml::to_string_pretty(&config) {
                let _ = fs::write(&path, content);
            }
            config
        }
    }
}

impl UserConfig {
    pub fn save(&self) {
        let path = AppConfig::config_path();
        if let Ok(content) = toml::to_string_pretty(self) {
            let _ = fs::write(path, content);
        }
    }
}

/// Resolved on-disk layout for one run. All artifact naming goes through
/// here so the canonical-key file families stay consistent.
#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    /// Layout from the user config plus an optional CLI override.
    pub fn resolve(config: &UserConfig, cli_data_dir: Option<&Path>) -> Self {
        let data_dir = cli_data_dir
            .map(Path::to_path_buf)
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(|| AppConfig::config_dir().join("data"));
        Self { data_dir }
    }

    /// Layout rooted at an explicit directory.
    pub fn rooted(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("music_index.json")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join("music_index.stats.json")
    }

    pub fn report_path(&self, key: &str) -> PathBuf {
        self.reports_dir().join(format!("repair_report_{key}.csv"))
    }

    pub fn selections_path(&self, key: &str) -> PathBuf {
        self.reports_dir().join(format!("selections_{key}.json"))
    }

    pub fn tmp_playlist_path(&self, key: &str) -> PathBuf {
        self.reports_dir().join(format!("__tmp_fixed_{key}.m3u"))
    }

    pub fn export_path(&self, key: &str) -> PathBuf {
        self.reports_dir().join(format!("fixed_{key}_selected.m3u"))
    }
}
