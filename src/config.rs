use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::app_list::APP_LIST_URL;
use crate::error::{Error, Result};
use crate::vdf::IndexPolicy;

const CONFIG_FILE: &str = "config.json";

/// Values remembered between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub steam_path: Option<PathBuf>,
    pub steam_id: Option<String>,
    pub index_policy: IndexPolicy,
    pub backup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            steam_path: None,
            steam_id: None,
            index_policy: IndexPolicy::default(),
            backup: true,
        }
    }
}

impl Settings {
    /// Defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Settings> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Configuration file {} does not exist.", path.display());
                return Ok(Settings::default());
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        let settings = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            error!("Error loading configuration from {}: {}", path.display(), e);
            Error::Json(e)
        })?;
        info!("Configuration loaded from {}.", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| Error::io(path, e))?;
        info!("Configuration saved to {}.", path.display());
        Ok(())
    }
}

/// Settings file location: `STEAM_SHORTCUTS_CONFIG`, else the user's
/// config directory, else the working directory.
pub fn settings_path() -> PathBuf {
    if let Ok(path) = std::env::var("STEAM_SHORTCUTS_CONFIG") {
        return PathBuf::from(path);
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("steam-shortcuts").join(CONFIG_FILE),
        None => PathBuf::from(CONFIG_FILE),
    }
}

/// Overrides read from the process environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Env {
    pub steam_path: Option<PathBuf>,
    pub app_list_url: String,
    pub api_key: Option<String>,
}

impl Env {
    pub fn from_env() -> Self {
        let api_key = std::env::var("STEAM_API_KEY").ok().filter(|key| !key.is_empty());
        if api_key.is_some() {
            info!("Successfully loaded STEAM_API_KEY from environment variables.");
        }

        Env {
            steam_path: std::env::var_os("STEAM_PATH").map(PathBuf::from),
            app_list_url: std::env::var("STEAM_APP_LIST_URL")
                .unwrap_or(APP_LIST_URL.to_string()),
            api_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.backup);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = Settings {
            steam_path: Some(PathBuf::from("/opt/steam")),
            steam_id: Some("76561197960287930".to_string()),
            index_policy: IndexPolicy::AfterMax,
            backup: false,
        };
        settings.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"index_policy\": \"after-max\""));
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"steam_id":"76561197960287930"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.steam_id.as_deref(), Some("76561197960287930"));
        assert_eq!(settings.index_policy, IndexPolicy::FirstGap);
        assert!(settings.backup);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Json(_))));
    }
}
