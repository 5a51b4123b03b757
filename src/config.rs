// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! User configuration for delivery and playback.

use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::export::ExportTarget;

/// How exported samples land on disk.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Deliver into the managed export directory, skipping samples that
    /// are already there.
    #[default]
    Managed,
    /// Save straight into the download directory, overwriting freely.
    Direct,
}

/// The application configuration.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct Config {
    /// The directory managed exports deliver into.
    export_dir: PathBuf,
    /// Whether managed exports write a placeholder file before rendering.
    #[serde(default = "default_placeholders")]
    placeholders: bool,
    /// The delivery mode for exports.
    #[serde(default)]
    delivery: DeliveryMode,
    /// The directory direct saves land in.
    #[serde(default)]
    download_dir: Option<PathBuf>,
    /// The audio device previews play on.
    #[serde(default = "default_audio_device")]
    audio_device: String,
}

fn default_placeholders() -> bool {
    true
}

fn default_audio_device() -> String {
    "default".to_string()
}

/// Parses the configuration from a YAML file.
pub fn parse_config(file: &Path) -> Result<Config, Box<dyn Error>> {
    let config: Config = match serde_yml::from_str(&fs::read_to_string(file)?) {
        Ok(config) => config,
        Err(e) => return Err(format!("error parsing file {}: {}", file.display(), e).into()),
    };
    Ok(config)
}

impl Config {
    /// The export target selected by this configuration.
    pub fn export_target(&self) -> Result<ExportTarget, Box<dyn Error>> {
        match self.delivery {
            DeliveryMode::Managed => Ok(ExportTarget::ManagedExport {
                base_dir: self.export_dir.clone(),
                placeholders: self.placeholders,
            }),
            DeliveryMode::Direct => match &self.download_dir {
                Some(download_dir) => Ok(ExportTarget::DirectSave {
                    base_dir: download_dir.clone(),
                }),
                None => Err("download_dir must be set when delivery is direct".into()),
            },
        }
    }

    /// The name of the audio device previews play on.
    pub fn audio_device(&self) -> &str {
        &self.audio_device
    }
}

#[cfg(test)]
impl Config {
    /// Creates a configuration for tests.
    pub fn new(
        export_dir: PathBuf,
        placeholders: bool,
        delivery: DeliveryMode,
        download_dir: Option<PathBuf>,
        audio_device: &str,
    ) -> Config {
        Config {
            export_dir,
            placeholders,
            delivery,
            download_dir,
            audio_device: audio_device.to_string(),
        }
    }
}
