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

//! cratedig is a sample library browser. It fetches compressed sample
//! previews, decodes each preview at most once, trims the result to the
//! catalog's declared duration, and either plays it or renders it to a
//! 16-bit WAV file for delivery.

pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod export;
pub mod fetch;
pub mod pcm;
pub mod playback;
pub mod playsync;
pub mod wav;
