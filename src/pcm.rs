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

//! Materialization of compressed previews into trimmed PCM.

use std::{fmt, io::Cursor, time::Duration};

use symphonia::core::audio::{AudioBuffer, AudioBufferRef};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::cache::DecodedAudio;

/// Frames dropped from the head of a trimmed preview to skip encoder
/// priming samples.
const PRIMING_FRAMES: usize = 1200;

/// Per-channel frame count at or above which a preview is passed through
/// untrimmed. Sized for 60 seconds of 44.1kHz audio.
const TRIM_BYPASS_FRAMES: usize = 60 * 44_100;

/// The error type for PCM materialization.
#[derive(Debug, thiserror::Error)]
pub enum PcmError {
    /// The compressed stream could not be probed or decoded.
    #[error("PCM decode failed: {0}")]
    DecodeFailed(#[from] SymphoniaError),
    /// The stream contains no audio track.
    #[error("preview stream contains no audio track")]
    NoAudioTrack,
    /// The stream decoded to zero audio frames.
    #[error("preview stream decoded to no audio frames")]
    EmptyStream,
    /// The channel layout changed partway through the stream.
    #[error("channel layout changed mid-stream (expected {expected}, got {actual})")]
    ChannelLayoutChanged { expected: usize, actual: usize },
    /// The blocking decode task stopped without producing a result.
    #[error("decode task stopped unexpectedly: {0}")]
    Task(String),
}

/// Decoded preview audio in planar form. Every channel holds the same
/// number of frames.
#[derive(Clone)]
pub struct PcmAudio {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmAudio {
    /// Creates PCM audio from planar channel buffers.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> PcmAudio {
        PcmAudio {
            channels,
            sample_rate,
        }
    }

    /// The decoded channels, one buffer per channel.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// The number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The number of frames in each channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// The sample rate of the decoded audio.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The playing time implied by the frame count and sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Interleaves the channels frame by frame for packed consumers.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut interleaved = Vec::with_capacity(frames * self.channels.len());
        for frame in 0..frames {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }
}

impl fmt::Debug for PcmAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmAudio")
            .field("channels", &self.channel_count())
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Decodes a compressed preview into PCM and trims it to the catalog
/// duration. The stream's own sample rate and channel layout are kept.
pub fn materialize(bytes: &[u8], declared_duration_ms: u64) -> Result<PcmAudio, PcmError> {
    let (channels, sample_rate) = decode_stream(bytes)?;
    let channels = trim(channels, sample_rate, declared_duration_ms);
    Ok(PcmAudio {
        channels,
        sample_rate,
    })
}

/// Runs materialization on the blocking pool.
pub async fn materialize_blocking(
    decoded: DecodedAudio,
    declared_duration_ms: u64,
) -> Result<PcmAudio, PcmError> {
    match tokio::task::spawn_blocking(move || materialize(decoded.bytes(), declared_duration_ms))
        .await
    {
        Ok(result) => result,
        Err(e) => Err(PcmError::Task(e.to_string())),
    }
}

/// Decodes the full compressed stream into planar f32 channels.
fn decode_stream(bytes: &[u8]) -> Result<(Vec<Vec<f32>>, u32), PcmError> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(PcmError::NoAudioTrack)?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut sample_rate = 0u32;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            // Some demuxers signal end of stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            Err(err) => return Err(err.into()),
        };
        if decoded.frames() == 0 {
            continue;
        }
        append_buffer(&decoded, &mut channels, &mut sample_rate)?;
    }

    if channels.first().map_or(true, |channel| channel.is_empty()) {
        return Err(PcmError::EmptyStream);
    }
    Ok((channels, sample_rate))
}

/// Appends a decoded buffer to the planar channels, converting samples
/// to f32.
fn append_buffer(
    decoded: &AudioBufferRef,
    channels: &mut Vec<Vec<f32>>,
    sample_rate: &mut u32,
) -> Result<(), PcmError> {
    match decoded {
        AudioBufferRef::U8(buf) => append_planar(buf, scale_u8, channels, sample_rate),
        AudioBufferRef::U16(buf) => append_planar(buf, scale_u16, channels, sample_rate),
        AudioBufferRef::U24(buf) => {
            append_planar(buf, |sample| scale_u24(sample.inner()), channels, sample_rate)
        }
        AudioBufferRef::U32(buf) => append_planar(buf, scale_u32, channels, sample_rate),
        AudioBufferRef::S8(buf) => append_planar(buf, scale_s8, channels, sample_rate),
        AudioBufferRef::S16(buf) => append_planar(buf, scale_s16, channels, sample_rate),
        AudioBufferRef::S24(buf) => {
            append_planar(buf, |sample| scale_s24(sample.inner()), channels, sample_rate)
        }
        AudioBufferRef::S32(buf) => append_planar(buf, scale_s32, channels, sample_rate),
        AudioBufferRef::F32(buf) => append_planar(buf, |sample| sample, channels, sample_rate),
        AudioBufferRef::F64(buf) => {
            append_planar(buf, |sample| sample as f32, channels, sample_rate)
        }
    }
}

/// Appends one decoded buffer's planes to the output channels. The first
/// buffer fixes the channel layout and sample rate for the whole stream.
fn append_planar<S, F>(
    buf: &AudioBuffer<S>,
    convert: F,
    channels: &mut Vec<Vec<f32>>,
    sample_rate: &mut u32,
) -> Result<(), PcmError>
where
    S: symphonia::core::sample::Sample,
    F: Fn(S) -> f32,
{
    let spec = buf.spec();
    let channel_count = spec.channels.count();
    if channels.is_empty() {
        *sample_rate = spec.rate;
        channels.resize_with(channel_count, Vec::new);
    } else if channels.len() != channel_count {
        return Err(PcmError::ChannelLayoutChanged {
            expected: channels.len(),
            actual: channel_count,
        });
    }

    let planes_binding = buf.planes();
    for (channel, plane) in channels.iter_mut().zip(planes_binding.planes()) {
        channel.extend(plane.iter().map(|sample| convert(*sample)));
    }
    Ok(())
}

/// Trims encoder padding from a decoded preview: priming frames at the
/// head, then everything past the catalog duration. Previews at or above
/// the bypass length are returned untouched.
fn trim(mut channels: Vec<Vec<f32>>, sample_rate: u32, declared_duration_ms: u64) -> Vec<Vec<f32>> {
    let frames = channels.first().map_or(0, Vec::len);
    if frames >= TRIM_BYPASS_FRAMES {
        debug!(frames = frames, "Preview exceeds trim bypass length, keeping whole stream");
        return channels;
    }

    // The cast saturates for absurd declared durations, and the saturating
    // add keeps the cut point past the end so only the priming skip applies.
    let declared_frames = (declared_duration_ms as f64 / 1000.0 * sample_rate as f64) as usize;
    for channel in channels.iter_mut() {
        let start = PRIMING_FRAMES.min(channel.len());
        let end = PRIMING_FRAMES.saturating_add(declared_frames).min(channel.len());
        channel.truncate(end);
        channel.drain(..start);
    }
    channels
}

#[inline]
fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u24(sample: u32) -> f32 {
    (sample as f32 / 16_777_215.0) * 2.0 - 1.0
}

#[inline]
fn scale_u32(sample: u32) -> f32 {
    ((sample as f64 / u32::MAX as f64) * 2.0 - 1.0) as f32
}

#[inline]
fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
fn scale_s32(sample: i32) -> f32 {
    (sample as f64 / (1i64 << 31) as f64) as f32
}
