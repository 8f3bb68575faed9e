use futures::StreamExt;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

use super::TransferResult;
use crate::speedtest::provider::ProviderError;

/// Edge lengths of the random images served by every speedtest.net server.
const IMAGE_SIZES: [u32; 6] = [350, 500, 750, 1000, 1500, 2000];
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);
const BUDGET: Duration = Duration::from_secs(10);

pub struct DownloadTest {
    sizes: Vec<u32>,
    budget: Duration,
}

impl DownloadTest {
    pub fn new() -> Self {
        Self {
            sizes: IMAGE_SIZES.to_vec(),
            budget: BUDGET,
        }
    }

    pub fn urls(&self, endpoint: &Url) -> Result<Vec<Url>, ProviderError> {
        self.sizes
            .iter()
            .map(|size| {
                endpoint
                    .join(&format!("random{size}x{size}.jpg"))
                    .map_err(|e| ProviderError::Malformed(format!("download url: {e}")))
            })
            .collect()
    }

    pub async fn run(&mut self, client: &Client, endpoint: &Url) -> Result<TransferResult, ProviderError> {
        let urls = self.urls(endpoint)?;
        let start = Instant::now();
        let mut downloaded: u64 = 0;

        for url in urls {
            if start.elapsed() >= self.budget {
                debug!(downloaded, "download budget spent");
                break;
            }

            let response = client.get(url.clone()).timeout(TRANSFER_TIMEOUT).send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                downloaded += chunk?.len() as u64;
            }
            trace!(%url, downloaded, elapsed_ms = start.elapsed().as_millis() as u64, "image fetched");
        }

        TransferResult::from_elapsed(downloaded, start.elapsed())
    }
}

impl Default for DownloadTest {
    fn default() -> Self {
        Self::new()
    }
}
