//! Application state shared by the request layer.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::db::ProfileDb;
use crate::types::Config;

/// State constructed once at application start-up. The advisor client is
/// built separately from `config.advisor` and handed to `AdvisorEngine`;
/// it is not stored here because request handlers share it by `Arc`.
pub struct AppState {
    pub config: Mutex<Option<Config>>,
    pub db: Mutex<Option<ProfileDb>>,
}

impl AppState {
    pub fn new() -> Self {
        let config = load_config().ok();

        let db = match ProfileDb::open() {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open profile database: {e}. DB features disabled.");
                None
            }
        };

        Self {
            config: Mutex::new(config),
            db: Mutex::new(db),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Path to the config file: `~/.careeros/config.json`.
fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Home directory not found")?;
    Ok(home.join(".careeros").join("config.json"))
}

/// Load configuration from disk. A missing file is an error the caller may
/// ignore; defaults cover every field.
pub fn load_config() -> Result<Config, String> {
    let path = config_path()?;
    let contents =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Persist configuration to disk, creating the directory if needed.
pub fn save_config(config: &Config) -> Result<(), String> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
    }
    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&path, contents).map_err(|e| format!("Failed to write config: {}", e))
}
