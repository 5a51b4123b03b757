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

//! Unwrapping of the catalog's preview container.

/// The error type for preview payload unwrapping.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload does not match the expected container shape. Retrying
    /// with the same payload will fail the same way.
    #[error("malformed preview payload: {0}")]
    Malformed(String),
}

/// Unwraps a catalog's preview container into a compressed audio stream.
///
/// Implementations are pure: the same payload always yields the same bytes
/// or the same error.
pub trait PreviewCodec: Send + Sync {
    /// Decodes the raw payload into a compressed audio stream.
    fn decode(&self, payload: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// A codec for catalogs that serve previews as plain compressed audio.
pub struct Passthrough;

impl PreviewCodec for Passthrough {
    fn decode(&self, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(payload.to_vec())
    }
}
