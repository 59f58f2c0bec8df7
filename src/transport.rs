//! The raw HTTP layer shared by the metadata and tabular export requests.

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

/// Anything that can answer a GET request with a response body.
///
/// [`ReqwestSource`] is the implementation used against the live services;
/// tests supply canned responses.
pub trait HttpSource {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, TransportError>>;
}

/// [`HttpSource`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestSource {
    client: Client,
}

impl ReqwestSource {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl HttpSource for ReqwestSource {
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network(url.to_string(), e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP error for {}: {}", url, status);
            return Err(TransportError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(url.to_string(), e))?;
        debug!("Received {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
