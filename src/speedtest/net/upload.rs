use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

use super::TransferResult;
use crate::speedtest::provider::ProviderError;

const PAYLOAD_SIZES: [usize; 4] = [250_000, 500_000, 1_000_000, 2_000_000];
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);
const BUDGET: Duration = Duration::from_secs(10);
const FIELD_PREFIX: &[u8] = b"content1=";

pub struct UploadTest {
    data: Vec<u8>,
    sizes: Vec<usize>,
    budget: Duration,
}

impl UploadTest {
    pub fn new() -> Self {
        let largest = PAYLOAD_SIZES.iter().copied().max().unwrap_or_default();
        let rng = rand::rngs::StdRng::from_entropy();
        let data: Vec<u8> = rng.sample_iter(&Alphanumeric).take(largest).collect();
        Self {
            data,
            sizes: PAYLOAD_SIZES.to_vec(),
            budget: BUDGET,
        }
    }

    /// Form body of exactly `size` bytes.
    pub fn payload(&self, size: usize) -> Vec<u8> {
        let size = size.max(FIELD_PREFIX.len());
        let mut body = Vec::with_capacity(size);
        body.extend_from_slice(FIELD_PREFIX);
        let fill = (size - FIELD_PREFIX.len()).min(self.data.len());
        body.extend_from_slice(&self.data[..fill]);
        body
    }

    pub async fn run(&mut self, client: &Client, endpoint: &Url) -> Result<TransferResult, ProviderError> {
        let start = Instant::now();
        let mut uploaded: u64 = 0;

        for &size in &self.sizes {
            if start.elapsed() >= self.budget {
                debug!(uploaded, "upload budget spent");
                break;
            }

            let body = self.payload(size);
            let len = body.len() as u64;
            let response = client
                .post(endpoint.clone())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .timeout(TRANSFER_TIMEOUT)
                .body(body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(ProviderError::Status {
                    url: endpoint.to_string(),
                    status: response.status().as_u16(),
                });
            }

            uploaded += len;
            trace!(size, uploaded, elapsed_ms = start.elapsed().as_millis() as u64, "payload sent");
        }

        TransferResult::from_elapsed(uploaded, start.elapsed())
    }
}

impl Default for UploadTest {
    fn default() -> Self {
        Self::new()
    }
}
