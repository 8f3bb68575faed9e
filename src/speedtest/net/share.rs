use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::header::REFERER;
use reqwest::Client;
use tracing::debug;

use super::TransferResult;
use crate::speedtest::provider::ProviderError;

const API_PATH: &str = "/api/api.php";
const API_REFERER: &str = "http://c.speedtest.net/flash/speedtest.swf";
const HASH_SALT: &str = "297aae72";
/// Longest slice of a rejection body kept for the error message.
const REJECTION_EXCERPT: usize = 120;

pub struct ShareRequest {
    pub server_id: String,
    pub ping_ms: f64,
    pub download: TransferResult,
    pub upload: TransferResult,
}

impl ShareRequest {
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let ping = self.ping_ms.round() as u64;
        let download = kbps(self.download.bits_per_second);
        let upload = kbps(self.upload.bits_per_second);
        let hash = format!(
            "{:x}",
            Md5::digest(format!("{ping}-{upload}-{download}-{HASH_SALT}").as_bytes())
        );

        vec![
            ("recommendedserverid", self.server_id.clone()),
            ("ping", ping.to_string()),
            ("screenresolution", String::new()),
            ("promo", String::new()),
            ("download", download.to_string()),
            ("screendpi", String::new()),
            ("upload", upload.to_string()),
            ("testmethod", "http".to_string()),
            ("hash", hash),
            ("touchscreen", "none".to_string()),
            ("startmode", "pingselect".to_string()),
            ("accuracy", "1".to_string()),
            ("bytesreceived", self.download.bytes.to_string()),
            ("bytessent", self.upload.bytes.to_string()),
            ("serverid", self.server_id.clone()),
        ]
    }

    pub async fn submit(
        &self,
        client: &Client,
        scheme: &str,
        host: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let url = format!("{scheme}://{host}{API_PATH}");
        let response = client
            .post(&url)
            .header(REFERER, API_REFERER)
            .timeout(timeout)
            .form(&self.form())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(%body, "share api response");
        let id = result_id(&body).ok_or_else(|| ProviderError::ShareRejected(excerpt(&body)))?;
        Ok(format!("{scheme}://{host}/result/{id}.png"))
    }
}

fn kbps(bits_per_second: f64) -> u64 {
    (bits_per_second / 1000.0).round() as u64
}

/// Single-line, bounded rendition of a response body.
fn excerpt(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= REJECTION_EXCERPT {
        return flat;
    }
    let mut cut: String = flat.chars().take(REJECTION_EXCERPT).collect();
    cut.push_str("...");
    cut
}

fn result_id(body: &str) -> Option<String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .find(|(key, _)| key == "resultid")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}
