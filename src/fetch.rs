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

//! Retrieval of raw preview payloads.

#[cfg(test)]
pub mod mock;

use std::time::Duration;

use tracing::debug;

/// The error type for preview retrieval.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Any other retrieval failure.
    #[error("{0}")]
    Other(String),
}

/// Retrieves raw preview payloads by URL.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the raw bytes at the given URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// A fetcher backed by an HTTP client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a new HTTP fetcher.
    pub fn new() -> Result<HttpFetcher, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = url, "Fetching preview payload");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
