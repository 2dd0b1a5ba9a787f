// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! User settings persisted between sessions.
//!
//! Settings live in a YAML file. A missing or unreadable file is never
//! fatal: the defaults are used and a warning is logged.

use crate::io::files::write_whole_file;
use crate::models::project::SortOrder;
use crate::models::toggle::Toggle;
use crate::predict::DetectorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sort_order: SortOrder,
    pub show_predictions: Toggle,
    pub show_marks: bool,
    pub show_labels: Toggle,
    pub detector: DetectorConfig,
    /// Only images whose path matches are opened; blank disables the filter.
    pub inclusion_regex: String,
    /// Images whose path matches are skipped; blank disables the filter.
    pub exclusion_regex: String,
    pub trash_dir_name: String,
    pub empty_images_dir_name: String,
    pub train_percentage: u32,
    pub display_scale: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::Alphabetical,
            show_predictions: Toggle::Auto,
            show_marks: true,
            show_labels: Toggle::Auto,
            detector: DetectorConfig::default(),
            inclusion_regex: String::new(),
            exclusion_regex: String::new(),
            trash_dir_name: ".trash".to_string(),
            empty_images_dir_name: "empty_images".to_string(),
            train_percentage: 85,
            display_scale: 1.0,
        }
    }
}

impl Settings {
    /// Default settings file location.
    ///
    /// On Linux: ~/.config/boxmark/settings.yaml
    pub fn settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("boxmark")
            .join("settings.yaml")
    }

    /// Load from `custom_path`, or the default location when `None`.
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = custom_path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::settings_path);

        if !path.exists() {
            log::info!("settings file not found at {}, using defaults", path.display());
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    log::info!("loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::error!("failed to parse settings file {}: {}", path.display(), e);
                    log::warn!("using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                log::error!("failed to read settings file {}: {}", path.display(), e);
                log::warn!("using default settings");
                Self::default()
            }
        }
    }

    /// Write the whole settings file, creating its directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("failed to encode settings")?;
        write_whole_file(path, yaml.as_bytes())
            .with_context(|| format!("failed to save settings to {}", path.display()))?;
        log::info!("saved settings to {}", path.display());
        Ok(())
    }
}
