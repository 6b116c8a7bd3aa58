//! Configuration and persisted preferences

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for persisted data
    pub data_dir: PathBuf,

    /// Preferences file shared with the status-bar app
    pub preferences_path: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = resolve_data_dir(
            std::env::var_os("KEYHUD_DATA_DIR").map(PathBuf::from),
            std::env::var("HOME").ok(),
        )?;
        Ok(Self::with_data_dir(data_dir))
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let preferences_path = data_dir.join("preferences.json");
        Self {
            data_dir,
            preferences_path,
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>, home: Option<String>) -> Result<PathBuf> {
    if let Some(dir) = explicit.filter(|dir| !dir.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let home = home.context("HOME is not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("keyhud"))
}

/// Which overlays the user wants to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "ShowCapsLockHUD", default = "enabled")]
    pub show_caps_lock_hud: bool,

    #[serde(rename = "ShowLanguageHUD", default = "enabled")]
    pub show_language_hud: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_caps_lock_hud: true,
            show_language_hud: true,
        }
    }
}

impl Preferences {
    /// Read preferences from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Write the defaults to `path` unless a file is already there.
    /// Returns whether a file was created.
    pub fn init_file(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("keyhud-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_data_dir_resolution() {
        let dir = assert_ok!(resolve_data_dir(None, Some("/Users/ana".to_string())));
        assert_eq!(dir, PathBuf::from("/Users/ana/.local/share/keyhud"));

        let dir = assert_ok!(resolve_data_dir(
            Some(PathBuf::from("/tmp/hud")),
            Some("/Users/ana".to_string())
        ));
        assert_eq!(dir, PathBuf::from("/tmp/hud"));

        assert_err!(resolve_data_dir(Some(PathBuf::new()), None));
    }

    #[test]
    fn test_config_paths() {
        let config = Config::with_data_dir(PathBuf::from("/tmp/hud"));
        assert_eq!(
            config.preferences_path,
            PathBuf::from("/tmp/hud/preferences.json")
        );
    }

    #[test]
    fn test_missing_preferences_default_to_enabled() {
        let dir = scratch_dir("missing");
        let prefs = assert_ok!(Preferences::load(&dir.join("preferences.json")));
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.show_caps_lock_hud && prefs.show_language_hud);
    }

    #[test]
    fn test_preferences_partial_and_unknown_keys() {
        let json = r#"{"ShowLanguageHUD": false, "LaunchAtLogin": true}"#;
        let prefs: Preferences = serde_json::from_str(json).unwrap();
        assert!(prefs.show_caps_lock_hud);
        assert!(!prefs.show_language_hud);
    }

    #[test]
    fn test_preferences_save_and_reload() {
        let dir = scratch_dir("save");
        let config = Config::with_data_dir(dir.clone());
        assert_ok!(config.ensure_dirs());

        let prefs = Preferences {
            show_caps_lock_hud: false,
            show_language_hud: true,
        };
        assert_ok!(prefs.save(&config.preferences_path));

        let raw = std::fs::read_to_string(&config.preferences_path).unwrap();
        assert!(raw.contains("\"ShowCapsLockHUD\": false"));
        assert_eq!(assert_ok!(Preferences::load(&config.preferences_path)), prefs);

        std::fs::write(&config.preferences_path, "not json").unwrap();
        assert_err!(Preferences::load(&config.preferences_path));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_init_file_writes_defaults_once() {
        let dir = scratch_dir("init");
        let config = Config::with_data_dir(dir.clone());
        assert_ok!(config.ensure_dirs());

        assert!(assert_ok!(Preferences::init_file(&config.preferences_path)));
        let raw = std::fs::read_to_string(&config.preferences_path).unwrap();
        assert!(raw.contains("\"ShowCapsLockHUD\": true"));
        assert!(raw.contains("\"ShowLanguageHUD\": true"));

        // An existing file, even one the user edited, is left alone
        let edited = Preferences {
            show_caps_lock_hud: true,
            show_language_hud: false,
        };
        assert_ok!(edited.save(&config.preferences_path));
        assert!(!assert_ok!(Preferences::init_file(&config.preferences_path)));
        assert_eq!(assert_ok!(Preferences::load(&config.preferences_path)), edited);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
