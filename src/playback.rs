// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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

//! Preview playback devices and the single voice controller.

pub mod mock;
pub mod rodio;

use std::{
    any::Any,
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Mutex, task};
use tracing::{debug, error, info};

use crate::{
    cache::{AcquireError, DecodeCache},
    catalog::Sample,
    pcm::{self, PcmAudio, PcmError},
    playsync::CancelHandle,
};

/// The error type for preview playback requests.
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("preview acquire failed: {0}")]
    Acquire(#[from] AcquireError),
    #[error("preview decode failed: {0}")]
    Pcm(#[from] PcmError),
}

/// An audio output that can voice a decoded preview.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// Plays the preview, blocking until it finishes or the cancel handle
    /// fires.
    fn play(
        &self,
        audio: Arc<PcmAudio>,
        cancel_handle: CancelHandle,
    ) -> Result<(), Box<dyn Error>>;

    /// Converts the device to a mock device.
    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Gets the audio output device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    }
    if name == "default" {
        return Ok(Arc::new(rodio::Device::new()));
    }
    Err(format!("unknown audio device '{}', expected 'default'", name).into())
}

/// The active preview voice.
struct Voice {
    sample_id: String,
    generation: u64,
    cancel: CancelHandle,
}

/// Plays sample previews, at most one at a time.
///
/// A request for a new sample stops whatever is playing first. A request
/// for the sample that is already playing is a no-op.
pub struct Controller {
    cache: Arc<DecodeCache>,
    device: Arc<dyn Device>,
    active: Arc<Mutex<Option<Voice>>>,
    generation: AtomicU64,
}

impl Controller {
    /// Creates a controller that voices previews on the given device.
    pub fn new(cache: Arc<DecodeCache>, device: Arc<dyn Device>) -> Controller {
        Controller {
            cache,
            device,
            active: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Requests playback of a sample's preview.
    ///
    /// Returns once the preview has started (or was found to be playing
    /// already). Playback itself runs in the background; any device error
    /// is logged rather than surfaced, since nothing can act on it.
    pub async fn request(&self, sample: &Sample) -> Result<(), PlayError> {
        {
            let mut active = self.active.lock().await;
            if let Some(voice) = active.as_ref() {
                if voice.sample_id == sample.uuid() {
                    debug!(sample = sample.uuid(), "Sample is already playing");
                    return Ok(());
                }
            }
            if let Some(voice) = active.take() {
                info!(sample = voice.sample_id.as_str(), "Stopping previous preview");
                voice.cancel.cancel();
            }
        }

        // The voice slot is free while we decode; a racing request may
        // claim it in the meantime.
        let decoded = self.cache.acquire(sample).await?;
        let audio = Arc::new(pcm::materialize_blocking(decoded, sample.duration_ms()).await?);

        let mut active = self.active.lock().await;
        match active.take() {
            Some(voice) if voice.sample_id == sample.uuid() => {
                // A racing request started this same sample; leave it be.
                *active = Some(voice);
                return Ok(());
            }
            Some(voice) => {
                info!(sample = voice.sample_id.as_str(), "Stopping previous preview");
                voice.cancel.cancel();
            }
            None => {}
        }

        let cancel_handle = CancelHandle::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let join_handle = {
            let device = self.device.clone();
            let audio = audio.clone();
            let cancel_handle = cancel_handle.clone();
            let sample_id = sample.uuid().to_string();
            task::spawn_blocking(move || {
                if let Err(e) = device.play(audio, cancel_handle) {
                    error!(err = ?e, sample = sample_id.as_str(), "Error playing preview");
                }
            })
        };
        info!(
            sample = sample.uuid(),
            duration = ?audio.duration(),
            "Preview started"
        );
        *active = Some(Voice {
            sample_id: sample.uuid().to_string(),
            generation,
            cancel: cancel_handle,
        });
        drop(active);

        // Clear the voice slot once playback ends, unless a newer voice
        // already took it over.
        let active = self.active.clone();
        let sample_id = sample.uuid().to_string();
        tokio::spawn(async move {
            let _ = join_handle.await;
            let mut active = active.lock().await;
            if active
                .as_ref()
                .map_or(false, |voice| voice.generation == generation)
            {
                info!(sample = sample_id.as_str(), "Preview finished");
                *active = None;
            }
        });

        Ok(())
    }

    /// Stops the active preview, if any. The next request for the same
    /// sample starts over from the beginning.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(voice) => {
                info!(sample = voice.sample_id.as_str(), "Stopping preview");
                voice.cancel.cancel();
            }
            None => {
                debug!("No preview is playing, nothing to stop");
            }
        }
    }

    /// Whether no preview is active.
    pub async fn is_idle(&self) -> bool {
        self.active.lock().await.is_none()
    }

    /// Waits until the active preview ends.
    pub async fn wait_until_idle(&self) {
        loop {
            if self.is_idle().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
