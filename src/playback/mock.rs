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

//! A mock playback device.

use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
};

use tracing::info;

use crate::{pcm::PcmAudio, playsync::CancelHandle};

/// A mock playback device. Playing "sounds" for the duration implied by the
/// audio's frame count and sample rate, or until cancelled.
#[derive(Clone)]
pub struct Device {
    name: String,
    /// The number of plays currently inside the play call. Preempted voices
    /// can overlap the voice that replaced them while they wind down.
    active: Arc<AtomicUsize>,
    play_count: Arc<AtomicUsize>,
    cancelled_count: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the mock device with the given name.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            active: Arc::new(AtomicUsize::new(0)),
            play_count: Arc::new(AtomicUsize::new(0)),
            cancelled_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether at least one play call is in progress.
    pub fn is_playing(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// The number of plays started on this device.
    pub fn play_count(&self) -> usize {
        self.play_count.load(Ordering::SeqCst)
    }

    /// The number of plays that ended through cancellation.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled_count.load(Ordering::SeqCst)
    }
}

impl super::Device for Device {
    fn play(
        &self,
        audio: Arc<PcmAudio>,
        cancel_handle: CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        let duration = audio.duration();
        info!(
            device = self.name.as_str(),
            frames = audio.frames(),
            duration = ?duration,
            "Playing preview (mock)."
        );

        self.active.fetch_add(1, Ordering::SeqCst);
        self.play_count.fetch_add(1, Ordering::SeqCst);

        let (sleep_tx, sleep_rx) = mpsc::channel::<()>();
        let finished = Arc::new(AtomicBool::new(false));
        let watcher_handle = {
            let finished = finished.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                // Waits out the audio, unless woken early by cancellation.
                let _ = sleep_rx.recv_timeout(duration);
                finished.store(true, Ordering::Relaxed);
                cancel_handle.notify();
            })
        };

        cancel_handle.wait(finished);
        if cancel_handle.is_cancelled() {
            self.cancelled_count.fetch_add(1, Ordering::SeqCst);
        }
        let _ = sleep_tx.send(());
        let join_result = watcher_handle.join();

        self.active.fetch_sub(1, Ordering::SeqCst);
        if join_result.is_err() {
            return Err("Error while joining mock playback thread!".into());
        }
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread, time::Duration};

    use super::Device;
    use crate::{
        pcm::PcmAudio, playback::Device as PlaybackDevice, playsync::CancelHandle,
        test::eventually,
    };

    #[test]
    fn test_mock_device_plays_out() {
        let device = Device::get("mock");
        // 50 frames at 1kHz sounds for 50ms.
        let audio = Arc::new(PcmAudio::new(vec![vec![0.0; 50]], 1000));

        device
            .play(audio, CancelHandle::new())
            .expect("Error playing");
        assert_eq!(1, device.play_count());
        assert_eq!(0, device.cancelled_count());
        assert!(!device.is_playing());
    }

    #[test]
    fn test_mock_device_cancel() {
        let device = Device::get("mock");
        let audio = Arc::new(PcmAudio::new(vec![vec![0.0; 5000]], 1000));
        let cancel_handle = CancelHandle::new();

        let play_handle = {
            let device = device.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                device
                    .play(audio, cancel_handle)
                    .map_err(|e| e.to_string())
            })
        };
        eventually(|| device.is_playing(), "Play never started");

        cancel_handle.cancel();
        play_handle
            .join()
            .expect("Error joining thread")
            .expect("Error playing");
        assert_eq!(1, device.cancelled_count());
        assert!(!device.is_playing());
    }

    #[test]
    fn test_mock_device_empty_audio_returns_immediately() {
        let device = Device::get("mock");
        let audio = Arc::new(PcmAudio::new(vec![Vec::new()], 1000));

        // Zero frames plays out immediately.
        let start = std::time::SystemTime::now();
        device
            .play(audio, CancelHandle::new())
            .expect("Error playing");
        assert!(start.elapsed().expect("Error getting elapsed time") < Duration::from_secs(1));
    }
}
