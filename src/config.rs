//! Terminal preferences for deskterm.
//!
//! Loaded from `~/.deskterm/config.toml`. Every field has a documented
//! default; missing keys fall back field by field, and an unparseable file
//! is discarded in favor of the defaults rather than crashing.
//!
//! ```toml
//! # Shell used by the sandbox runtime
//! shell = "/bin/sh"
//!
//! # Scrollback entries kept per session
//! scrollback_limit = 1000
//!
//! # Bell style: none, visual, audible
//! bell_style = "visual"
//!
//! [tab_bar]
//! visible = true
//! position = "top"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bell behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BellStyle {
    None,
    Visual,
    Audible,
}

/// Tab bar placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabBarPosition {
    Top,
    Bottom,
}

/// Main preferences record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Shell command backing the sandbox runtime
    pub shell: String,
    /// Scrollback entries kept per session
    pub scrollback_limit: usize,
    pub bell_style: BellStyle,
    pub tab_bar: TabBarConfig,
    /// Ask before closing a pane with a pending command
    pub confirm_close: bool,
    /// Copy selected text to the clipboard on selection
    pub copy_on_select: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            scrollback_limit: 1000,
            bell_style: BellStyle::Visual,
            tab_bar: TabBarConfig::default(),
            confirm_close: true,
            copy_on_select: false,
        }
    }
}

/// Tab bar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabBarConfig {
    pub visible: bool,
    pub position: TabBarPosition,
}

impl Default for TabBarConfig {
    fn default() -> Self {
        Self {
            visible: true,
            position: TabBarPosition::Top,
        }
    }
}

impl Preferences {
    /// Load preferences from a file, defaulting on absence or corruption
    pub fn load(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(prefs) => return prefs,
                Err(e) => warn!("discarding corrupt preferences: {}", e),
            }
        }
        Self::default()
    }

    /// Save preferences to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Data directory for preferences, stores, and the log file
pub fn data_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)?;
    let dir = home.join(".deskterm");
    if !dir.exists() {
        let _ = fs::create_dir_all(&dir);
    }
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "scrollback_limit = 50\n").unwrap();

        let prefs = Preferences::load(&path);
        assert_eq!(prefs.scrollback_limit, 50);
        assert_eq!(prefs.shell, "/bin/sh");
        assert_eq!(prefs.bell_style, BellStyle::Visual);
        assert!(prefs.tab_bar.visible);
        assert_eq!(prefs.tab_bar.position, TabBarPosition::Top);
    }

    #[test]
    fn test_corrupt_file_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "shell = [broken").unwrap();

        let prefs = Preferences::load(&path);
        assert_eq!(prefs.shell, "/bin/sh");
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut prefs = Preferences::default();
        prefs.shell = "/bin/bash".to_string();
        prefs.tab_bar.position = TabBarPosition::Bottom;
        prefs.save(&path).unwrap();

        let loaded = Preferences::load(&path);
        assert_eq!(loaded.shell, "/bin/bash");
        assert_eq!(loaded.tab_bar.position, TabBarPosition::Bottom);
    }
}
