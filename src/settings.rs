//! Code for loading program settings.
use crate::get_powermatch_config_dir;
use crate::input::read_toml;
use crate::log::{DEFAULT_LOG_LEVEL, parse_log_level};
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for powermatch
# Uncomment a setting to change it from its default value
";

/// Default log level for program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_powermatch_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to overwrite output files by default
    #[serde(default)]
    pub overwrite: bool,
    /// Whether to write the hourly dispatch of every facility to a CSV file
    #[serde(default)]
    pub debug_model: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            overwrite: false,
            debug_model: false,
        }
    }
}

impl Settings {
    /// Read the contents of a settings file from the model directory.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read settings from the specified path, falling back on defaults if there is no file
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        parse_log_level(&settings.log_level)
            .with_context(|| format!("Invalid log_level in {}", file_path.display()))?;

        Ok(settings)
    }

    /// Turn on the output options requested on the command line.
    ///
    /// Flags can only switch options on, never off.
    pub fn with_run_options(mut self, overwrite: bool, debug_model: bool) -> Self {
        self.overwrite |= overwrite;
        self.debug_model |= debug_model;
        self
    }

    /// The contents of the default settings file, with every setting commented out and documented
    pub fn default_file_contents() -> Result<String> {
        let settings_raw =
            toml::to_string(&Settings::default()).context("Could not convert settings to TOML")?;

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };
            let docs = Settings::get_field_docs(field.trim())
                .with_context(|| format!("Missing doc comment for setting {}", field.trim()))?;
            out.push('\n');
            for doc_line in docs.lines() {
                out.push_str(&format!("# # {}\n", doc_line.trim()));
            }
            out.push_str(&format!("# {}\n", line.trim()));
        }

        Ok(out)
    }
}
