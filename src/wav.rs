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

//! Rendering of PCM audio to 16-bit WAV.

use std::io::Cursor;

/// The error type for WAV rendering.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// There are no channels to render.
    #[error("cannot encode a WAV file with no channels")]
    NoChannels,
    /// The channels hold differing numbers of frames.
    #[error("channels hold differing frame counts")]
    MismatchedChannels,
    /// The sample rate is zero.
    #[error("cannot encode a WAV file with a zero sample rate")]
    ZeroSampleRate,
    /// More channels than the WAV header can express.
    #[error("too many channels for a WAV file: {0}")]
    TooManyChannels(usize),
    /// The underlying writer failed.
    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Renders planar f32 channels as an in-memory 16-bit PCM WAV file.
///
/// Samples are clamped to [-1.0, 1.0] and written interleaved. Zero-length
/// channels produce a header-only file. The output depends only on the
/// input, so repeated renders of the same audio are byte-identical.
pub fn encode(channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, EncodeError> {
    if channels.is_empty() {
        return Err(EncodeError::NoChannels);
    }
    let frames = channels[0].len();
    if channels.iter().any(|channel| channel.len() != frames) {
        return Err(EncodeError::MismatchedChannels);
    }
    if sample_rate == 0 {
        return Err(EncodeError::ZeroSampleRate);
    }
    let channel_count =
        u16::try_from(channels.len()).map_err(|_| EncodeError::TooManyChannels(channels.len()))?;

    let spec = hound::WavSpec {
        channels: channel_count,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(scale_to_i16(channel[frame]))?;
        }
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

#[inline]
fn scale_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
