//! HTTP client for artifact downloads.

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::io::Write;
use std::time::Duration;

use super::status::classify_status;

pub const USER_AGENT: &str = "superqode-installer";

/// Upper bound for a whole artifact transfer.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HTTP client used for artifact transfers. Downloads are attempted once.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client with the installer's user agent and a bounded request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    /// Streams the body at `url` into the writer returned by `create_writer`.
    ///
    /// The writer is only created once the response status is known to be a
    /// success. Returns the number of bytes written.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| describe_transport_error(e, url))?;

        if let Some(status_error) = classify_status(response.status(), url) {
            return Err(status_error.into());
        }

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| describe_transport_error(e, url))?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }
}

fn describe_transport_error(error: reqwest::Error, url: &str) -> anyhow::Error {
    if error.is_timeout() {
        anyhow::Error::from(error).context(format!("Timed out downloading {}", url))
    } else if error.is_connect() {
        anyhow::Error::from(error).context(format!("Failed to connect to {}", url))
    } else {
        anyhow::Error::from(error).context(format!("Failed to download {}", url))
    }
}
