use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::archive::classify::FilterMode;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub archive: ArchiveConfig,
    pub history: HistoryConfig,
    pub easy: EasyConfig,
    pub repair: RepairConfig,
    pub pdf: PdfConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }

    /// Loads the given config file, or falls back to defaults when none is given
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Config::default()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArchiveConfig {
    /// HTML written before everything else in the generated page
    pub header_template: PathBuf,
    pub intro: bool,
    pub filter: FilterMode,
    pub follow_symlinks: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            header_template: PathBuf::from("HTMLheader.txt"),
            intro: true,
            filter: FilterMode::Timestamp,
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// Use git history to order duplicate versions; mtime only when false
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EasyConfig {
    pub max_chords: usize,
}

impl Default for EasyConfig {
    fn default() -> Self {
        Self { max_chords: 3 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RepairConfig {
    /// Folder scanned for `.chopro` files when no files are named
    pub song_dir: PathBuf,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            song_dir: PathBuf::from("music/ChordPro"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PdfConfig {
    /// Program and arguments; the sheet path is appended as the last argument
    pub command: Vec<String>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        let command = [
            "chordpro",
            "--config=Ukulele",
            "--config=Ukulele-ly",
            "--define=pdf:diagrams:show=top",
            "--define=settings:inline-chords=true",
            "--define=pdf:margintop=70",
            "--define=pdf:marginbottom=0",
            "--define=pdf:marginleft=20",
            "--define=pdf:marginright=20",
            "--define=pdf:headspace=50",
            "--define=pdf:footspace=10",
            "--define=pdf:head-first-only=true",
            "--define=pdf:fonts:chord:color=red",
            "--text-font=helvetica",
            "--chord-font=helvetica",
        ];
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }
}
