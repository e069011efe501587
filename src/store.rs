//! Durable stores for display profiles and saved SSH connections.
//!
//! Both tables round-trip through TOML under `~/.deskterm/`. On load,
//! corrupt or unparseable records are discarded (with a warning) rather
//! than crashing the subsystem; every mutation flushes back to disk.
//! Stores are created in `main` and passed by reference to whatever needs
//! them - no hidden globals.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Profiles are referenced by id from every leaf pane
pub type ProfileId = String;

/// Cursor rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStyle {
    Block,
    Underline,
    Bar,
}

/// Display and behavior preset for a leaf pane.
///
/// Numeric fields are clamped on insert/update so a stored profile is
/// always renderable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub background_color: String,
    pub background_opacity: f32,
    pub text_color: String,
    pub font_size: u8,
    pub font_family: String,
    pub cursor_style: CursorStyle,
    pub cursor_blink: bool,
    pub padding: u8,
}

impl Profile {
    /// The built-in default profile
    pub fn fallback() -> Self {
        Self {
            id: "default".to_string(),
            name: "Default".to_string(),
            background_color: "#1a1b26".to_string(),
            background_opacity: 0.95,
            text_color: "#c0caf5".to_string(),
            font_size: 14,
            font_family: "monospace".to_string(),
            cursor_style: CursorStyle::Block,
            cursor_blink: true,
            padding: 8,
        }
    }

    fn clamped(mut self) -> Self {
        self.background_opacity = self.background_opacity.clamp(0.2, 1.0);
        self.font_size = self.font_size.clamp(10, 24);
        self.padding = self.padding.clamp(4, 32);
        self
    }
}

/// On-disk shape of the profile table
#[derive(Debug, Serialize, Deserialize)]
struct ProfileFile {
    default_profile: ProfileId,
    profiles: Vec<Profile>,
}

/// CRUD over named profiles with a guaranteed-resolvable fallback chain:
/// requested id, then default id, then first in table.
pub struct ProfileStore {
    profiles: Vec<Profile>,
    default_id: ProfileId,
    path: Option<PathBuf>,
}

impl ProfileStore {
    /// Load from a TOML file, falling back to the built-in default table
    /// when the file is missing or corrupt
    pub fn load(path: &Path) -> Self {
        let mut store = Self {
            profiles: vec![Profile::fallback()],
            default_id: "default".to_string(),
            path: Some(path.to_path_buf()),
        };
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str::<ProfileFile>(&content) {
                Ok(file) if !file.profiles.is_empty() => {
                    store.profiles = file.profiles.into_iter().map(Profile::clamped).collect();
                    store.default_id = file.default_profile;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("discarding corrupt profile table: {}", e);
                }
            }
        }
        store
    }

    /// In-memory store for tests and headless use
    pub fn in_memory() -> Self {
        Self {
            profiles: vec![Profile::fallback()],
            default_id: "default".to_string(),
            path: None,
        }
    }

    /// Resolve a profile reference. Never fails: a leaf is never left
    /// without renderable styling.
    pub fn resolve(&self, id: &str) -> &Profile {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .or_else(|| self.profiles.iter().find(|p| p.id == self.default_id))
            .unwrap_or(&self.profiles[0])
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Insert or replace a profile (fields clamped), then flush
    pub fn upsert(&mut self, profile: Profile) {
        let profile = profile.clamped();
        match self.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        self.flush();
    }

    /// Remove a profile. The table never becomes empty; if the default is
    /// removed, the first remaining profile becomes the default.
    pub fn remove(&mut self, id: &str) {
        if self.profiles.len() <= 1 {
            return;
        }
        self.profiles.retain(|p| p.id != id);
        if !self.profiles.iter().any(|p| p.id == self.default_id) {
            self.default_id = self.profiles[0].id.clone();
        }
        self.flush();
    }

    pub fn set_default(&mut self, id: &str) {
        if self.profiles.iter().any(|p| p.id == id) {
            self.default_id = id.to_string();
            self.flush();
        }
    }

    fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let file = ProfileFile {
            default_profile: self.default_id.clone(),
            profiles: self.profiles.clone(),
        };
        match toml::to_string_pretty(&file) {
            Ok(content) => {
                if let Err(e) = fs::write(path, content) {
                    warn!("failed to write profile table: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize profile table: {}", e),
        }
    }
}

fn default_port() -> u16 {
    22
}

/// A saved remote connection descriptor. Pure configuration data;
/// connecting does not mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConnection {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl SshConnection {
    /// A record is connectable only with a non-empty host and username.
    /// Enforced at this boundary; incomplete records are stored as-is.
    pub fn is_connectable(&self) -> bool {
        !self.host.trim().is_empty() && !self.username.trim().is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SshFile {
    #[serde(default)]
    connections: Vec<SshConnection>,
}

/// CRUD over saved SSH connection descriptors
pub struct SshConnectionRegistry {
    connections: Vec<SshConnection>,
    path: Option<PathBuf>,
}

impl SshConnectionRegistry {
    pub fn load(path: &Path) -> Self {
        let mut registry = Self {
            connections: Vec::new(),
            path: Some(path.to_path_buf()),
        };
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str::<SshFile>(&content) {
                Ok(file) => registry.connections = file.connections,
                Err(e) => warn!("discarding corrupt SSH connection table: {}", e),
            }
        }
        registry
    }

    pub fn in_memory() -> Self {
        Self {
            connections: Vec::new(),
            path: None,
        }
    }

    pub fn connections(&self) -> &[SshConnection] {
        &self.connections
    }

    pub fn get(&self, id: &str) -> Option<&SshConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn upsert(&mut self, connection: SshConnection) {
        match self.connections.iter_mut().find(|c| c.id == connection.id) {
            Some(existing) => *existing = connection,
            None => self.connections.push(connection),
        }
        self.flush();
    }

    pub fn remove(&mut self, id: &str) {
        self.connections.retain(|c| c.id != id);
        self.flush();
    }

    fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let file = SshFile {
            connections: self.connections.clone(),
        };
        match toml::to_string_pretty(&file) {
            Ok(content) => {
                if let Err(e) = fs::write(path, content) {
                    warn!("failed to write SSH connection table: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize SSH connection table: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: id.to_string(),
            ..Profile::fallback()
        }
    }

    #[test]
    fn test_resolve_fallback_chain() {
        let mut store = ProfileStore::in_memory();
        store.upsert(profile("work"));
        store.upsert(profile("play"));

        // Requested id wins
        assert_eq!(store.resolve("play").id, "play");
        // Missing id falls back to the default
        assert_eq!(store.resolve("ghost").id, "default");
        // Missing default falls back to first-in-table
        store.set_default("work");
        store.remove("work");
        assert_eq!(store.resolve("ghost").id, store.profiles()[0].id);
    }

    #[test]
    fn test_profile_fields_clamped() {
        let mut store = ProfileStore::in_memory();
        let mut p = profile("wild");
        p.background_opacity = 7.5;
        p.font_size = 99;
        p.padding = 1;
        store.upsert(p);

        let stored = store.get("wild").unwrap();
        assert_eq!(stored.background_opacity, 1.0);
        assert_eq!(stored.font_size, 24);
        assert_eq!(stored.padding, 4);
    }

    #[test]
    fn test_table_never_empty() {
        let mut store = ProfileStore::in_memory();
        store.remove("default");
        assert_eq!(store.profiles().len(), 1);
    }

    #[test]
    fn test_roundtrip_and_corrupt_discard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.toml");

        let mut store = ProfileStore::load(&path);
        store.upsert(profile("work"));
        store.set_default("work");

        let reloaded = ProfileStore::load(&path);
        assert_eq!(reloaded.default_id(), "work");
        assert!(reloaded.get("work").is_some());

        // Corrupt file is discarded, defaults restored, no panic
        fs::write(&path, "not [valid toml").unwrap();
        let recovered = ProfileStore::load(&path);
        assert_eq!(recovered.default_id(), "default");
        assert_eq!(recovered.profiles().len(), 1);
    }

    #[test]
    fn test_ssh_connectable_boundary() {
        let conn = SshConnection {
            id: "1".to_string(),
            name: "build box".to_string(),
            host: "build.example.com".to_string(),
            port: 22,
            username: "ci".to_string(),
            identity_file: None,
        };
        assert!(conn.is_connectable());

        let incomplete = SshConnection {
            host: "  ".to_string(),
            ..conn.clone()
        };
        assert!(!incomplete.is_connectable());

        // Incomplete records are stored anyway; validation is a boundary
        // check, not an error state
        let mut registry = SshConnectionRegistry::in_memory();
        registry.upsert(incomplete);
        assert_eq!(registry.connections().len(), 1);
    }

    #[test]
    fn test_ssh_roundtrip_default_port() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ssh.toml");

        fs::write(
            &path,
            "[[connections]]\nid = \"1\"\nname = \"box\"\nhost = \"h\"\nusername = \"u\"\n",
        )
        .unwrap();
        let registry = SshConnectionRegistry::load(&path);
        assert_eq!(registry.get("1").unwrap().port, 22);
    }
}
