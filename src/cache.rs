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

//! A per-sample cache over preview fetch and decode.

use std::{collections::HashMap, fmt, sync::Arc};

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{catalog::Sample, codec::PreviewCodec, fetch::Fetcher};

/// The error type for acquiring decoded preview audio.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcquireError {
    /// The catalog record carries no preview audio asset.
    #[error("sample has no preview audio asset")]
    AssetMissing,
    /// The preview bytes could not be retrieved. The next acquire retries.
    #[error("preview fetch failed: {0}")]
    FetchFailed(String),
    /// The preview payload could not be unwrapped.
    #[error("preview decode failed: {0}")]
    DecodeFailed(String),
}

/// A decoded preview audio stream. Clones share the underlying bytes.
#[derive(Clone)]
pub struct DecodedAudio {
    bytes: Arc<Vec<u8>>,
}

impl DecodedAudio {
    fn new(bytes: Vec<u8>) -> DecodedAudio {
        DecodedAudio {
            bytes: Arc::new(bytes),
        }
    }

    /// The compressed audio stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// The published outcome of a fill. None while the fill is still running.
type FillSlot = Option<Result<DecodedAudio, AcquireError>>;

/// A cache entry for a single sample.
enum Entry {
    /// The fetch and decode is still running. The receiver resolves once the
    /// fill task publishes its outcome.
    InFlight(watch::Receiver<FillSlot>),
    /// The decoded audio is available.
    Ready(DecodedAudio),
}

/// The result of looking up a sample in the cache.
enum Lookup {
    Ready(DecodedAudio),
    Pending(watch::Receiver<FillSlot>),
}

/// A cache of decoded previews, keyed by sample uuid.
///
/// Each sample is fetched and decoded at most once at a time: concurrent
/// acquires of the same sample join the in-flight fill rather than starting
/// their own. Successful fills are kept for the lifetime of the cache.
/// Failed fills are forgotten, so the next acquire starts fresh.
pub struct DecodeCache {
    fetcher: Arc<dyn Fetcher>,
    codec: Arc<dyn PreviewCodec>,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl DecodeCache {
    /// Creates a new decode cache over the given fetcher and codec.
    pub fn new(fetcher: Arc<dyn Fetcher>, codec: Arc<dyn PreviewCodec>) -> DecodeCache {
        DecodeCache {
            fetcher,
            codec,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the decoded preview for the sample, fetching and decoding it
    /// if no other caller has already done so.
    pub async fn acquire(&self, sample: &Sample) -> Result<DecodedAudio, AcquireError> {
        let mut rx = match self.lookup_or_start(sample).await? {
            Lookup::Ready(audio) => return Ok(audio),
            Lookup::Pending(rx) => rx,
        };

        let outcome = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone(),
            // The fill task stopped without publishing, treat it like a
            // failed fetch.
            Err(_) => {
                return Err(AcquireError::FetchFailed(
                    "preview fill stopped before completing".to_string(),
                ))
            }
        };
        match outcome {
            Some(result) => result,
            None => Err(AcquireError::FetchFailed(
                "preview fill published no outcome".to_string(),
            )),
        }
    }

    /// Starts filling the cache for the sample without waiting for the
    /// result. Fill failures are dropped; the next acquire retries.
    pub async fn prefetch(&self, sample: &Sample) {
        if let Err(e) = self.lookup_or_start(sample).await {
            debug!(sample = sample.uuid(), err = ?e, "Prefetch skipped");
        }
    }

    /// Finds the cache entry for the sample, starting a fill task if there
    /// is none. The entry is inserted before the task is spawned, so every
    /// concurrent caller observes it.
    async fn lookup_or_start(&self, sample: &Sample) -> Result<Lookup, AcquireError> {
        let url = sample
            .preview_url()
            .ok_or(AcquireError::AssetMissing)?
            .to_string();

        let mut entries = self.entries.lock().await;
        match entries.get(sample.uuid()) {
            Some(Entry::Ready(audio)) => {
                debug!(sample = sample.uuid(), "Using cached preview");
                return Ok(Lookup::Ready(audio.clone()));
            }
            // A closed channel that never published means the fill task
            // died. Fall through and start over.
            Some(Entry::InFlight(rx)) if rx.has_changed().is_ok() || rx.borrow().is_some() => {
                debug!(sample = sample.uuid(), "Joining in-flight preview fill");
                return Ok(Lookup::Pending(rx.clone()));
            }
            Some(Entry::InFlight(_)) => {
                warn!(sample = sample.uuid(), "Preview fill died, restarting");
            }
            None => {}
        }

        let (tx, rx) = watch::channel(None);
        entries.insert(sample.uuid().to_string(), Entry::InFlight(rx.clone()));
        self.start_fill(sample.uuid().to_string(), url, tx);
        Ok(Lookup::Pending(rx))
    }

    /// Spawns the fill task for a sample. The task runs to completion even
    /// if every interested caller goes away.
    fn start_fill(&self, uuid: String, url: String, tx: watch::Sender<FillSlot>) {
        let fetcher = self.fetcher.clone();
        let codec = self.codec.clone();
        let entries = self.entries.clone();

        tokio::spawn(async move {
            info!(sample = uuid.as_str(), "Fetching preview");
            let result = match fetcher.fetch(&url).await {
                Ok(payload) => match codec.decode(&payload) {
                    Ok(bytes) => {
                        debug!(
                            sample = uuid.as_str(),
                            bytes = bytes.len(),
                            "Preview decoded"
                        );
                        Ok(DecodedAudio::new(bytes))
                    }
                    Err(e) => {
                        warn!(sample = uuid.as_str(), err = ?e, "Error decoding preview");
                        Err(AcquireError::DecodeFailed(e.to_string()))
                    }
                },
                Err(e) => {
                    warn!(sample = uuid.as_str(), err = ?e, "Error fetching preview");
                    Err(AcquireError::FetchFailed(e.to_string()))
                }
            };

            {
                let mut entries = entries.lock().await;
                match &result {
                    Ok(audio) => {
                        entries.insert(uuid.clone(), Entry::Ready(audio.clone()));
                    }
                    Err(_) => {
                        entries.remove(&uuid);
                    }
                }
            }

            // Publish after the map is updated so a waiter that re-acquires
            // immediately sees the settled entry.
            let _ = tx.send(Some(result));
        });
    }
}

impl fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeCache").finish_non_exhaustive()
    }
}
