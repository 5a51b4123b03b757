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

//! Typed views over saved catalog listings.

use std::{error::Error, fmt, fs, path::Path};

use serde::Deserialize;

/// The asset slug of the compressed preview recording attached to a sample.
const PREVIEW_ASSET_SLUG: &str = "preview_mp3";
/// The asset slug of a pack's cover image.
const COVER_ASSET_SLUG: &str = "cover_image";

/// A single sample record from a catalog listing.
#[derive(Deserialize, Clone, Debug)]
pub struct Sample {
    uuid: String,
    /// The full catalog name. May contain directory style separators.
    name: String,
    /// The catalog duration in milliseconds.
    duration: u64,
    #[serde(default)]
    asset_category_slug: Option<String>,
    #[serde(default)]
    bpm: Option<u32>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    chord_type: Option<String>,
    #[serde(default)]
    files: Vec<AssetFile>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    parents: Parents,
}

/// The catalog's wrapper around a record's parent listing.
#[derive(Deserialize, Clone, Debug, Default)]
struct Parents {
    #[serde(default)]
    items: Vec<Pack>,
}

/// The pack that owns a sample.
#[derive(Deserialize, Clone, Debug)]
pub struct Pack {
    name: String,
    #[serde(default)]
    permalink_base_url: Option<String>,
    #[serde(default)]
    files: Vec<AssetFile>,
}

/// A file attached to a catalog record.
#[derive(Deserialize, Clone, Debug)]
pub struct AssetFile {
    asset_file_type_slug: String,
    url: String,
}

/// A descriptive tag attached to a sample.
#[derive(Deserialize, Clone, Debug)]
pub struct Tag {
    uuid: String,
    label: String,
}

impl Sample {
    /// The catalog identifier of this sample.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The full catalog name of this sample.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last path segment of the catalog name.
    pub fn base_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// The catalog duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration
    }

    /// The catalog duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration as f64 / 1000.0
    }

    /// The category slug of this sample, e.g. "oneshot".
    pub fn category(&self) -> Option<&str> {
        self.asset_category_slug.as_deref()
    }

    /// The tempo of this sample in beats per minute.
    pub fn bpm(&self) -> Option<u32> {
        self.bpm
    }

    /// The musical key combined with the chord type, e.g. "C# Minor".
    pub fn key_display(&self) -> Option<String> {
        let key = self.key.as_ref()?;
        let chord = match self.chord_type.as_deref() {
            Some("major") => " Major",
            Some(_) => " Minor",
            None => "",
        };
        Some(format!("{}{}", key.to_uppercase(), chord))
    }

    /// The labels of all tags attached to this sample.
    pub fn tag_labels(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.label.as_str()).collect()
    }

    /// The tags attached to this sample.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// The URL of the compressed preview recording, if the record has one.
    pub fn preview_url(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.asset_file_type_slug == PREVIEW_ASSET_SLUG)
            .map(|file| file.url.as_str())
    }

    /// The pack this sample belongs to.
    pub fn pack(&self) -> Option<&Pack> {
        self.parents.items.first()
    }
}

#[cfg(test)]
impl Sample {
    /// Creates a sample record for tests.
    pub fn new(uuid: &str, name: &str, duration_ms: u64, preview_url: Option<&str>) -> Sample {
        Sample {
            uuid: uuid.to_string(),
            name: name.to_string(),
            duration: duration_ms,
            asset_category_slug: None,
            bpm: None,
            key: None,
            chord_type: None,
            files: preview_url
                .map(|url| {
                    vec![AssetFile {
                        asset_file_type_slug: PREVIEW_ASSET_SLUG.to_string(),
                        url: url.to_string(),
                    }]
                })
                .unwrap_or_default(),
            tags: Vec::new(),
            parents: Parents::default(),
        }
    }

    /// Attaches an owning pack to this sample record.
    pub fn with_pack(mut self, name: &str) -> Sample {
        self.parents.items = vec![Pack::new(name)];
        self
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}\n  Pack: {}\n  Category: {}\n  Duration: {:.2}s\n  Key: {}\n  BPM: {}\n  Tags: {}",
            self.base_name(),
            self.pack().map(Pack::name).unwrap_or("-"),
            self.category().unwrap_or("-"),
            self.duration_seconds(),
            self.key_display().unwrap_or_else(|| "-".to_string()),
            self.bpm
                .map(|bpm| bpm.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.tag_labels().join(", "),
        )
    }
}

impl Pack {
    /// The name of this pack.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The catalog permalink slug of this pack.
    pub fn permalink(&self) -> Option<&str> {
        self.permalink_base_url.as_deref()
    }

    /// The URL of this pack's cover image.
    pub fn cover_url(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.asset_file_type_slug == COVER_ASSET_SLUG)
            .map(|file| file.url.as_str())
    }
}

#[cfg(test)]
impl Pack {
    /// Creates a pack record for tests.
    pub fn new(name: &str) -> Pack {
        Pack {
            name: name.to_string(),
            permalink_base_url: None,
            files: Vec::new(),
        }
    }
}

impl Tag {
    /// The catalog identifier of this tag.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The human readable label of this tag.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Reads a saved catalog listing. A listing is a JSON array of sample
/// records as returned by the catalog search API.
pub fn load_samples(path: &Path) -> Result<Vec<Sample>, Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("error reading listing {}: {}", path.display(), e))?;
    let samples: Vec<Sample> = serde_json::from_str(&contents)
        .map_err(|e| format!("error parsing listing {}: {}", path.display(), e))?;
    Ok(samples)
}

/// Finds a sample in a listing by uuid or name.
pub fn find_sample<'a>(samples: &'a [Sample], query: &str) -> Result<&'a Sample, Box<dyn Error>> {
    samples
        .iter()
        .find(|sample| {
            sample.uuid == query || sample.name == query || sample.base_name() == query
        })
        .ok_or_else(|| format!("sample '{}' not found in listing", query).into())
}
