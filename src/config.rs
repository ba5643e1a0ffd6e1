// Configuration management for autotap

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::keymap::{KeyMap, ScreenSize};
use crate::midi::DecodeOptions;
use crate::song::SongOptions;
use crate::transform::TransformOptions;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Ticks cut from a note that is re-struck before its note-off.
    /// Also sets the preferred gap between consecutive chords.
    #[serde(default = "default_release_gap_ticks")]
    pub release_gap_ticks: u64,

    /// Shortest note in ticks (0 = no minimum beyond 1ms)
    #[serde(default)]
    pub min_note_duration_ticks: u64,

    /// Current screen size, used to rescale pixel key maps
    #[serde(default)]
    pub screen: Option<ScreenSize>,

    /// Key map file; the built-in 21-key layout is used when unset
    #[serde(default)]
    pub keymap_path: Option<PathBuf>,

    /// Optional song rewrites (transpose, black keys, silences, window)
    #[serde(default)]
    pub transform: TransformOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            release_gap_ticks: default_release_gap_ticks(),
            min_note_duration_ticks: 0,
            screen: None,
            keymap_path: None,
            transform: TransformOptions::default(),
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => {
                    match toml::from_str(&contents) {
                        Ok(config) => return config,
                        Err(e) => {
                            log::warn!("Failed to parse config: {}", e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    pub fn song_options(&self) -> SongOptions {
        SongOptions {
            decode: DecodeOptions {
                release_gap_ticks: self.release_gap_ticks,
                min_note_duration_ticks: self.min_note_duration_ticks,
            },
            transform: self.transform.clone(),
        }
    }

    /// Key map named by the config, or the built-in layout
    pub fn load_keymap(&self) -> anyhow::Result<KeyMap> {
        match self.keymap_path {
            Some(ref path) => KeyMap::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load key map {}: {}", path.display(), e)),
            None => Ok(KeyMap::default_layout()),
        }
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autotap")
        .join("config.toml")
}

/// Default release gap (for serde)
fn default_release_gap_ticks() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::BlackKeyPolicy;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("nope.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.release_gap_ticks, 1);
    }

    #[test]
    fn broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "release_gap_ticks = \"lots\"").unwrap();
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "min_note_duration_ticks = 30\n\n[transform]\ntranspose = -12\nblack_keys = \"up\"\n",
        )
        .unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.release_gap_ticks, 1);
        assert_eq!(config.min_note_duration_ticks, 30);
        assert_eq!(config.transform.transpose, -12);
        assert_eq!(config.transform.black_keys, BlackKeyPolicy::Up);
        assert!(!config.transform.melody_only);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            release_gap_ticks: 4,
            screen: Some(ScreenSize { width: 2400, height: 1080 }),
            keymap_path: Some(PathBuf::from("keys.toml")),
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(Config::load_or_default(&path), config);
        assert_eq!(config.song_options().decode.release_gap_ticks, 4);
    }

    #[test]
    fn built_in_keymap_without_path() {
        let keymap = Config::default().load_keymap().unwrap();
        assert_eq!(keymap.keys.len(), 21);

        let config = Config { keymap_path: Some(PathBuf::from("/does/not/exist.toml")), ..Default::default() };
        assert!(config.load_keymap().is_err());
    }
}
