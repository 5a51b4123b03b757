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

//! A playback device backed by the system's default audio output.

use std::{
    error::Error,
    fmt,
    sync::{atomic::AtomicBool, atomic::Ordering, Arc},
    thread,
};

use rodio::{buffer::SamplesBuffer, OutputStreamBuilder, Sink};
use tracing::info;

use crate::{pcm::PcmAudio, playsync::CancelHandle};

/// A playback device that voices previews on the default output stream.
pub struct Device;

impl Device {
    /// Creates a new default output device.
    pub fn new() -> Device {
        Device
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::new()
    }
}

impl super::Device for Device {
    fn play(
        &self,
        audio: Arc<PcmAudio>,
        cancel_handle: CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        let channels = u16::try_from(audio.channel_count())?;

        let mut stream = OutputStreamBuilder::open_default_stream()?;
        // rodio logs to stderr when an OutputStream is dropped.
        stream.log_on_drop(false);
        let sink = Arc::new(Sink::connect_new(stream.mixer()));

        info!(duration = ?audio.duration(), "Playing preview");
        sink.append(SamplesBuffer::new(
            channels,
            audio.sample_rate(),
            audio.interleaved(),
        ));

        let finished = Arc::new(AtomicBool::new(false));
        let watcher_handle = {
            let sink = sink.clone();
            let finished = finished.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                sink.sleep_until_end();
                finished.store(true, Ordering::Relaxed);
                cancel_handle.notify();
            })
        };

        cancel_handle.wait(finished);
        if cancel_handle.is_cancelled() {
            // Stopping the sink also releases the watcher.
            sink.stop();
        }
        if watcher_handle.join().is_err() {
            return Err("Error while joining playback watcher thread!".into());
        }
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "default (rodio)")
    }
}
