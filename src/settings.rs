//! Persisted last-used directory pair.
//!
//! The settings file is a small pretty-printed JSON document living next to
//! the executable. Nothing here ever fails the run: a missing or broken file
//! yields empty defaults, and a failed save is logged and ignored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the settings document
pub const SETTINGS_FILE_NAME: &str = "sldprt2stl.json";

/// Last-used input/output directories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub input_directory: String,
    #[serde(default)]
    pub output_directory: String,
}

impl Settings {
    pub fn new(input_directory: impl Into<String>, output_directory: impl Into<String>) -> Self {
        Self {
            input_directory: input_directory.into(),
            output_directory: output_directory.into(),
        }
    }
}

/// Reads and writes [`Settings`] at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store located in the directory of the running executable.
    ///
    /// Falls back to the current directory when the executable path is
    /// unavailable.
    pub fn beside_executable() -> Self {
        let dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last saved settings, or empty defaults.
    pub fn load(&self) -> Settings {
        if !self.path.exists() {
            debug!("No settings file at {:?}, using defaults", self.path);
            return Settings::default();
        }

        match self.read() {
            Ok(settings) => {
                info!("Loaded settings from {:?}", self.path);
                settings
            }
            Err(e) => {
                warn!("Failed to load settings: {:#}", e);
                Settings::default()
            }
        }
    }

    /// Overwrite the settings file. Failures are logged only.
    pub fn save(&self, settings: &Settings) {
        match self.write(settings) {
            Ok(()) => info!("Saved settings to {:?}", self.path),
            Err(e) => warn!("Failed to save settings: {:#}", e),
        }
    }

    fn read(&self) -> Result<Settings> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {:?}", self.path))?;

        serde_json::from_str(&content).context("Failed to parse settings JSON")
    }

    /// Writes through a sibling temp file so a failed write never clobbers
    /// the previous document.
    fn write(&self, settings: &Settings) -> Result<()> {
        let mut json =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        json.push('\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to replace {:?}", self.path));
        }

        Ok(())
    }
}
