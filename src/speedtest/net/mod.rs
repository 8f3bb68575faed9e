//! Speedtest.net-compatible provider.
//!
//! Talks to the public speedtest.net server list and to the individual
//! measurement servers over plain HTTP(S).

pub mod download;
pub mod servers;
pub mod share;
pub mod upload;

#[cfg(test)]
mod test_support;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use self::download::DownloadTest;
use self::servers::{LatencyProbe, Server};
use self::share::ShareRequest;
use self::upload::UploadTest;
use super::normalize::RawTimestamp;
use super::provider::{AggregatedResult, Availability, MeasurementProvider, ProviderError, ServerInfo};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HOST: &str = "www.speedtest.net";
const USER_AGENT: &str = concat!("speedcheck/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy)]
pub struct TransferResult {
    pub bytes: u64,
    pub bits_per_second: f64,
}

impl TransferResult {
    pub fn from_elapsed(bytes: u64, elapsed: Duration) -> Result<Self, ProviderError> {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Err(ProviderError::Malformed(
                "transfer completed too fast to measure".to_string(),
            ));
        }
        Ok(Self {
            bytes,
            bits_per_second: bytes as f64 * 8.0 / secs,
        })
    }
}

pub struct SpeedtestNet {
    client: Result<Client, String>,
    host: String,
    secure: bool,
    timeout: Duration,
    servers: Vec<Server>,
    best: Option<(Server, f64)>,
    download: Option<TransferResult>,
    upload: Option<TransferResult>,
    finished_at: Option<DateTime<Utc>>,
}

impl SpeedtestNet {
    pub fn new() -> Self {
        Self::with_host(DEFAULT_HOST)
    }

    /// Provider using `host` for the server list and share API.
    pub fn with_host(host: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("could not initialise the HTTP client ({e}); check the TLS setup"));

        Self {
            client,
            host: host.into(),
            secure: true,
            timeout: Duration::from_secs(10),
            servers: Vec::new(),
            best: None,
            download: None,
            upload: None,
            finished_at: None,
        }
    }

    fn client(&self) -> Result<&Client, ProviderError> {
        self.client
            .as_ref()
            .map_err(|reason| ProviderError::Malformed(reason.clone()))
    }

    fn selected(&self) -> Result<&Server, ProviderError> {
        self.best
            .as_ref()
            .map(|(server, _)| server)
            .ok_or(ProviderError::NoServerSelected)
    }

    fn selected_url(&self) -> Result<Url, ProviderError> {
        self.selected()?.endpoint(self.secure)
    }

    fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }
}

impl Default for SpeedtestNet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeasurementProvider for SpeedtestNet {
    fn probe(&self) -> Availability {
        match &self.client {
            Ok(_) => Availability::Ready,
            Err(reason) => Availability::Missing {
                remediation: reason.clone(),
            },
        }
    }

    async fn discover_servers(&mut self, secure: bool, timeout: Duration) -> Result<(), ProviderError> {
        self.secure = secure;
        self.timeout = timeout;

        let servers = servers::fetch_servers(self.client()?, self.scheme(), &self.host, timeout).await?;
        if servers.is_empty() {
            return Err(ProviderError::NoServers);
        }
        info!(count = servers.len(), "discovered servers");
        self.servers = servers;
        Ok(())
    }

    async fn select_best_server(&mut self) -> Result<ServerInfo, ProviderError> {
        if self.servers.is_empty() {
            return Err(ProviderError::NoServers);
        }

        let probe = LatencyProbe::new(self.timeout);
        let (server, latency_ms) = probe
            .best(self.client()?, &self.servers, self.secure)
            .await?;
        debug!(server = %server.info.label(), latency_ms, "best server");

        let info = server.info.clone();
        self.best = Some((server, latency_ms));
        Ok(info)
    }

    async fn measure_download(&mut self) -> Result<f64, ProviderError> {
        let base = self.selected_url()?;
        let result = DownloadTest::new().run(self.client()?, &base).await?;
        self.download = Some(result);
        Ok(result.bits_per_second)
    }

    async fn measure_upload(&mut self) -> Result<f64, ProviderError> {
        let target = self.selected_url()?;
        let result = UploadTest::new().run(self.client()?, &target).await?;
        self.upload = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(result.bits_per_second)
    }

    async fn request_share_reference(&mut self) -> Result<Option<String>, ProviderError> {
        let (server, ping) = self.best.as_ref().ok_or(ProviderError::NoServerSelected)?;
        let (download, upload) = match (self.download, self.upload) {
            (Some(download), Some(upload)) => (download, upload),
            _ => return Err(ProviderError::NotMeasured),
        };

        let request = ShareRequest {
            server_id: server.id(),
            ping_ms: *ping,
            download,
            upload,
        };
        let url = request
            .submit(self.client()?, self.scheme(), &self.host, self.timeout)
            .await?;
        Ok(Some(url))
    }

    fn aggregated_result(&self) -> Result<AggregatedResult, ProviderError> {
        let (server, ping) = self.best.as_ref().ok_or(ProviderError::NoServerSelected)?;
        let finished_at = self.finished_at.ok_or(ProviderError::NotMeasured)?;

        Ok(AggregatedResult {
            ping: *ping,
            timestamp: RawTimestamp::Text(finished_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            server: server.info.clone(),
        })
    }
}
