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

//! A mock fetcher that serves canned outcomes.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use super::FetchError;

/// A mock fetcher. Queued outcomes are served in order; once the queue is
/// empty the fallback payload is served forever, if one is set.
pub struct Fetcher {
    outcomes: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    fallback: Option<Vec<u8>>,
    latency: Option<Duration>,
    fetch_count: AtomicUsize,
}

impl Fetcher {
    /// Creates a fetcher that always serves the given payload.
    pub fn with_payload(payload: Vec<u8>) -> Fetcher {
        Fetcher {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: Some(payload),
            latency: None,
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Creates a fetcher that serves the given outcomes in order.
    pub fn with_outcomes(outcomes: Vec<Result<Vec<u8>, String>>) -> Fetcher {
        Fetcher {
            outcomes: Mutex::new(outcomes.into()),
            fallback: None,
            latency: None,
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Makes every fetch take at least the given duration.
    pub fn with_latency(mut self, latency: Duration) -> Fetcher {
        self.latency = Some(latency);
        self
    }

    /// The number of fetches issued against this fetcher.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl super::Fetcher for Fetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .outcomes
            .lock()
            .expect("Error getting lock")
            .pop_front();
        match outcome {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(message)) => Err(FetchError::Other(message)),
            None => match &self.fallback {
                Some(payload) => Ok(payload.clone()),
                None => Err(FetchError::Other(
                    "mock fetcher has no more responses".to_string(),
                )),
            },
        }
    }
}
