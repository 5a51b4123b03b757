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

//! Delivery of rendered samples to disk.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    cache::{AcquireError, DecodeCache},
    catalog::{Pack, Sample},
    pcm::{self, PcmError},
    wav::{self, EncodeError},
};

/// Where rendered files land.
#[derive(Clone, Debug)]
pub enum ExportTarget {
    /// A library directory the exporter owns. Files already on disk are
    /// never rewritten, and a zero-byte placeholder can stand in for the
    /// file while it renders.
    ManagedExport {
        base_dir: PathBuf,
        placeholders: bool,
    },
    /// A plain download directory. Every delivery writes.
    DirectSave { base_dir: PathBuf },
}

/// The outcome of a delivery.
#[derive(Debug, PartialEq)]
pub enum DeliveryResult {
    /// The sample was rendered and written to the given path.
    Written(PathBuf),
    /// A managed export found the file already on disk and left it alone.
    AlreadyDelivered(PathBuf),
}

/// Hands delivered files to the platform drag-and-drop machinery.
///
/// Delivery never waits on or inspects the outcome of a drag gesture.
pub trait DragHost: Send + Sync {
    /// Offers the given paths for dragging.
    fn offer(&self, paths: &[PathBuf], icon: Option<&Path>);
}

/// The error type for writing rendered files.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// An error writing the rendered file.
    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// An error writing the placeholder that precedes the rendered file.
    #[error("error writing placeholder {}: {source}", path.display())]
    Placeholder {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The error type for the full export chain.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export acquire failed: {0}")]
    Acquire(#[from] AcquireError),
    #[error("export decode failed: {0}")]
    Pcm(#[from] PcmError),
    #[error("export render failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("export delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Builds the delivery file name for a sample: "{pack} - {sample}.wav".
///
/// The directory-style prefix of the catalog name and any trailing ".wav"
/// are dropped before sanitizing, so every delivery mode resolves a sample
/// to the same name.
pub fn file_name(pack: &Pack, sample: &Sample) -> String {
    let base = sample.base_name();
    let stem = if base.len() >= 4
        && base.is_char_boundary(base.len() - 4)
        && base[base.len() - 4..].eq_ignore_ascii_case(".wav")
    {
        &base[..base.len() - 4]
    } else {
        base
    };
    format!("{} - {}.wav", sanitize(pack.name()), sanitize(stem))
}

/// Replaces characters that are unsafe in file names, including spaces and
/// path separators, with underscores.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

/// Renders samples to WAV files and lands them at a delivery target.
pub struct Exporter {
    cache: Arc<DecodeCache>,
    target: ExportTarget,
    drag_host: Option<Arc<dyn DragHost>>,
}

impl Exporter {
    /// Creates an exporter that delivers to the given target, optionally
    /// offering drag gestures for managed exports.
    pub fn new(
        cache: Arc<DecodeCache>,
        target: ExportTarget,
        drag_host: Option<Arc<dyn DragHost>>,
    ) -> Exporter {
        Exporter {
            cache,
            target,
            drag_host,
        }
    }

    /// The on-disk path a sample delivers to.
    pub fn target_path(&self, pack: &Pack, sample: &Sample) -> PathBuf {
        let base_dir = match &self.target {
            ExportTarget::ManagedExport { base_dir, .. } => base_dir,
            ExportTarget::DirectSave { base_dir } => base_dir,
        };
        base_dir.join(file_name(pack, sample))
    }

    /// Runs the full export chain for a sample: acquire the preview, decode
    /// and trim it, render it to WAV and deliver the file.
    ///
    /// A managed export that already holds the file skips everything except
    /// the drag offer.
    pub async fn export(
        &self,
        pack: &Pack,
        sample: &Sample,
    ) -> Result<DeliveryResult, ExportError> {
        if let ExportTarget::ManagedExport { .. } = self.target {
            let path = self.target_path(pack, sample);
            if file_exists(&path).await {
                info!(path = ?path, "Sample already delivered");
                self.offer_drag(&path);
                return Ok(DeliveryResult::AlreadyDelivered(path));
            }
        }

        let decoded = self.cache.acquire(sample).await?;
        let audio = pcm::materialize_blocking(decoded, sample.duration_ms()).await?;
        let rendered = wav::encode(audio.channels(), audio.sample_rate())?;
        Ok(self.deliver(&rendered, pack, sample).await?)
    }

    /// Lands rendered WAV bytes at the delivery target.
    pub async fn deliver(
        &self,
        rendered: &[u8],
        pack: &Pack,
        sample: &Sample,
    ) -> Result<DeliveryResult, DeliveryError> {
        let path = self.target_path(pack, sample);
        match &self.target {
            ExportTarget::ManagedExport { placeholders, .. } => {
                if file_exists(&path).await {
                    info!(path = ?path, "Sample already delivered");
                    self.offer_drag(&path);
                    return Ok(DeliveryResult::AlreadyDelivered(path));
                }

                if *placeholders {
                    // A zero-byte marker lets the drag gesture start before
                    // the render lands.
                    write_placeholder(&path).await?;
                    self.offer_drag(&path);
                    if let Err(e) = write_file(&path, rendered).await {
                        // Remove the marker so a retry starts clean.
                        if let Err(remove_err) = fs::remove_file(&path).await {
                            warn!(path = ?path, err = ?remove_err, "Error removing placeholder");
                        }
                        return Err(e);
                    }
                } else {
                    write_file(&path, rendered).await?;
                    self.offer_drag(&path);
                }
                info!(path = ?path, bytes = rendered.len(), "Sample delivered");
                Ok(DeliveryResult::Written(path))
            }
            ExportTarget::DirectSave { .. } => {
                write_file(&path, rendered).await?;
                info!(path = ?path, bytes = rendered.len(), "Sample saved");
                Ok(DeliveryResult::Written(path))
            }
        }
    }

    fn offer_drag(&self, path: &Path) {
        if let Some(drag_host) = &self.drag_host {
            debug!(path = ?path, "Offering drag gesture");
            drag_host.offer(&[path.to_path_buf()], None);
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Writes the zero-byte placeholder at the final path.
async fn write_placeholder(path: &Path) -> Result<(), DeliveryError> {
    let map_err = |source| DeliveryError::Placeholder {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(map_err)?;
    }
    fs::write(path, []).await.map_err(map_err)
}

/// Writes bytes through a staging sibling and renames it into place, so an
/// interrupted write never leaves a truncated file at the final path.
async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), DeliveryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| DeliveryError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let staging = path.with_extension("wav.part");
    fs::write(&staging, bytes)
        .await
        .map_err(|source| DeliveryError::Write {
            path: staging.clone(),
            source,
        })?;
    if let Err(source) = fs::rename(&staging, path).await {
        if let Err(remove_err) = fs::remove_file(&staging).await {
            warn!(path = ?staging, err = ?remove_err, "Error removing staging file");
        }
        return Err(DeliveryError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{
        path::{Path, PathBuf},
        sync::{Arc, Mutex},
    };

    use super::{file_name, DeliveryResult, DragHost, ExportTarget, Exporter};
    use crate::{
        cache::DecodeCache,
        catalog::{Pack, Sample},
        codec::Passthrough,
        fetch::mock,
        wav,
    };

    /// Records every drag offer along with the file size at offer time.
    struct RecordingDrag {
        offers: Mutex<Vec<(PathBuf, u64)>>,
    }

    impl RecordingDrag {
        fn new() -> RecordingDrag {
            RecordingDrag {
                offers: Mutex::new(Vec::new()),
            }
        }

        fn offers(&self) -> Vec<(PathBuf, u64)> {
            self.offers.lock().expect("Error getting lock").clone()
        }
    }

    impl DragHost for RecordingDrag {
        fn offer(&self, paths: &[PathBuf], _icon: Option<&Path>) {
            let path = paths.first().cloned().unwrap_or_default();
            let len = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
            self.offers
                .lock()
                .expect("Error getting lock")
                .push((path, len));
        }
    }

    fn test_pack() -> Pack {
        Pack::new("Drum Breaks Vol. 2")
    }

    fn test_sample() -> Sample {
        Sample::new(
            "5amp1e",
            "kicks/Kick:One*.wav",
            50,
            Some("https://catalog.test/previews/5amp1e.mp3"),
        )
    }

    /// A tiny cache wired to serve a valid WAV preview.
    fn wav_cache(frames: usize, sample_rate: u32) -> (Arc<DecodeCache>, Arc<mock::Fetcher>) {
        let source: Vec<f32> = (0..frames).map(|i| (i % 100) as f32 / 100.0).collect();
        let bytes = wav::encode(&[source], sample_rate).expect("Error encoding wav");
        let fetcher = Arc::new(mock::Fetcher::with_payload(bytes));
        let cache = Arc::new(DecodeCache::new(fetcher.clone(), Arc::new(Passthrough)));
        (cache, fetcher)
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            "Drum_Breaks_Vol._2 - Kick_One_.wav",
            file_name(&test_pack(), &test_sample())
        );

        // Case-insensitive extension strip, no directory prefix.
        let sample = Sample::new("u", "Snare Tail.WAV", 100, None);
        assert_eq!(
            "Drum_Breaks_Vol._2 - Snare_Tail.wav",
            file_name(&test_pack(), &sample)
        );

        // Names without the extension gain it.
        let sample = Sample::new("u", "808s/Sub\\Bass", 100, None);
        assert_eq!(
            "Drum_Breaks_Vol._2 - Sub_Bass.wav",
            file_name(&test_pack(), &sample)
        );
    }

    #[tokio::test]
    async fn test_managed_delivery_writes_then_drags() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, _) = wav_cache(3000, 44_100);
        let drag = Arc::new(RecordingDrag::new());
        let exporter = Exporter::new(
            cache,
            ExportTarget::ManagedExport {
                base_dir: dir.path().to_path_buf(),
                placeholders: false,
            },
            Some(drag.clone()),
        );

        let rendered = b"RIFF-rendered-bytes".to_vec();
        let result = exporter
            .deliver(&rendered, &test_pack(), &test_sample())
            .await
            .expect("Error delivering");

        let path = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav");
        assert_eq!(DeliveryResult::Written(path.clone()), result);
        assert_eq!(
            rendered,
            std::fs::read(&path).expect("Error reading delivered file")
        );
        // The drag gesture came after the write, so it saw the full file.
        let offers = drag.offers();
        assert_eq!(1, offers.len());
        assert_eq!((path, rendered.len() as u64), offers[0]);
    }

    #[tokio::test]
    async fn test_managed_delivery_with_placeholders_drags_first() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, _) = wav_cache(3000, 44_100);
        let drag = Arc::new(RecordingDrag::new());
        let exporter = Exporter::new(
            cache,
            ExportTarget::ManagedExport {
                base_dir: dir.path().to_path_buf(),
                placeholders: true,
            },
            Some(drag.clone()),
        );

        let rendered = b"RIFF-rendered-bytes".to_vec();
        let result = exporter
            .deliver(&rendered, &test_pack(), &test_sample())
            .await
            .expect("Error delivering");

        let path = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav");
        assert_eq!(DeliveryResult::Written(path.clone()), result);
        assert_eq!(
            rendered,
            std::fs::read(&path).expect("Error reading delivered file")
        );
        // The drag gesture saw the zero-byte placeholder, not the render.
        let offers = drag.offers();
        assert_eq!(1, offers.len());
        assert_eq!((path, 0), offers[0]);
    }

    #[tokio::test]
    async fn test_managed_delivery_skips_existing_files() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, _) = wav_cache(3000, 44_100);
        let drag = Arc::new(RecordingDrag::new());
        let exporter = Exporter::new(
            cache,
            ExportTarget::ManagedExport {
                base_dir: dir.path().to_path_buf(),
                placeholders: false,
            },
            Some(drag.clone()),
        );
        let pack = test_pack();
        let sample = test_sample();

        exporter
            .deliver(b"first render", &pack, &sample)
            .await
            .expect("Error delivering");
        let result = exporter
            .deliver(b"second render", &pack, &sample)
            .await
            .expect("Error delivering");

        let path = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav");
        assert_eq!(DeliveryResult::AlreadyDelivered(path.clone()), result);
        // The original bytes stay put, and both deliveries offered a drag.
        assert_eq!(
            b"first render".to_vec(),
            std::fs::read(&path).expect("Error reading delivered file")
        );
        assert_eq!(2, drag.offers().len());
    }

    #[tokio::test]
    async fn test_direct_save_always_writes() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, _) = wav_cache(3000, 44_100);
        let exporter = Exporter::new(
            cache,
            ExportTarget::DirectSave {
                base_dir: dir.path().to_path_buf(),
            },
            None,
        );
        let pack = test_pack();
        let sample = test_sample();

        for rendered in [b"first render".to_vec(), b"second render".to_vec()] {
            let result = exporter
                .deliver(&rendered, &pack, &sample)
                .await
                .expect("Error delivering");
            let path = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav");
            assert_eq!(DeliveryResult::Written(path.clone()), result);
            assert_eq!(
                rendered,
                std::fs::read(&path).expect("Error reading delivered file")
            );
        }
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_placeholder() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, _) = wav_cache(3000, 44_100);
        let exporter = Exporter::new(
            cache,
            ExportTarget::ManagedExport {
                base_dir: dir.path().to_path_buf(),
                placeholders: true,
            },
            None,
        );
        let pack = test_pack();
        let sample = test_sample();

        // Occupy the staging path with a directory so the render cannot be
        // written.
        let staging = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav.part");
        std::fs::create_dir(&staging).expect("Error creating staging dir");

        assert!(exporter.deliver(b"render", &pack, &sample).await.is_err());
        // The placeholder was rolled back, so a retry starts from nothing.
        let path = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_export_renders_and_delivers() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, fetcher) = wav_cache(5000, 44_100);
        let exporter = Exporter::new(
            cache,
            ExportTarget::ManagedExport {
                base_dir: dir.path().to_path_buf(),
                placeholders: false,
            },
            None,
        );
        let pack = test_pack();
        let sample = test_sample();

        let result = exporter
            .export(&pack, &sample)
            .await
            .expect("Error exporting");
        let path = dir.path().join("Drum_Breaks_Vol._2 - Kick_One_.wav");
        assert_eq!(DeliveryResult::Written(path.clone()), result);

        // The delivered file is a playable 16-bit WAV trimmed to the
        // catalog duration: 50ms at 44.1kHz.
        let reader = hound::WavReader::open(&path).expect("Error reading delivered file");
        assert_eq!(1, reader.spec().channels);
        assert_eq!(44_100, reader.spec().sample_rate);
        assert_eq!(2205, reader.duration());

        // A second export short circuits before fetching anything.
        assert_eq!(1, fetcher.fetch_count());
        let result = exporter
            .export(&pack, &sample)
            .await
            .expect("Error exporting");
        assert_eq!(DeliveryResult::AlreadyDelivered(path), result);
        assert_eq!(1, fetcher.fetch_count());
    }

    #[tokio::test]
    async fn test_export_without_preview_asset() {
        let dir = tempfile::tempdir().expect("Error creating temp dir");
        let (cache, _) = wav_cache(3000, 44_100);
        let exporter = Exporter::new(
            cache,
            ExportTarget::DirectSave {
                base_dir: dir.path().to_path_buf(),
            },
            None,
        );
        let sample = Sample::new("nopreview", "Lonely Loop.wav", 4254, None);

        assert!(exporter.export(&test_pack(), &sample).await.is_err());
        assert!(std::fs::read_dir(dir.path())
            .expect("Error listing dir")
            .next()
            .is_none());
    }
}
