use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::speedtest::provider::{ProviderError, ServerInfo};

const SERVER_LIST_PATH: &str = "/api/js/servers?engine=js&limit=10";
const CANDIDATES: usize = 5;
const PROBES_PER_SERVER: usize = 3;
/// Penalty recorded for a probe that failed or returned the wrong body.
const FAILED_PROBE_MS: f64 = 3_600_000.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    #[serde(default)]
    id: Value,
    url: String,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(flatten)]
    pub info: ServerInfo,
}

impl Server {
    pub fn id(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Upload endpoint of the server, with its scheme forced to match the
    /// requested transport.
    pub fn endpoint(&self, secure: bool) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ProviderError::Malformed(format!("server url {}: {e}", self.url)))?;
        let scheme = if secure { "https" } else { "http" };
        if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
            return Err(ProviderError::Malformed(format!(
                "server url {} cannot use {scheme}",
                self.url
            )));
        }
        Ok(url)
    }
}

pub fn server_list_url(scheme: &str, host: &str) -> String {
    let mut url = format!("{scheme}://{host}{SERVER_LIST_PATH}");
    if scheme == "https" {
        url.push_str("&https_functional=true");
    }
    url
}

pub async fn fetch_servers(
    client: &Client,
    scheme: &str,
    host: &str,
    timeout: Duration,
) -> Result<Vec<Server>, ProviderError> {
    let url = server_list_url(scheme, host);
    debug!(%url, "fetching server list");

    let response = client.get(&url).timeout(timeout).send().await?;
    if !response.status().is_success() {
        return Err(ProviderError::Status {
            url,
            status: response.status().as_u16(),
        });
    }

    let body = response.text().await?;
    parse_servers(&body)
}

pub fn parse_servers(body: &str) -> Result<Vec<Server>, ProviderError> {
    let mut servers: Vec<Server> =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(format!("server list: {e}")))?;
    servers.sort_by(|a, b| {
        let a = a.distance.unwrap_or(f64::MAX);
        let b = b.distance.unwrap_or(f64::MAX);
        a.total_cmp(&b)
    });
    Ok(servers)
}

pub struct LatencyProbe {
    timeout: Duration,
}

impl LatencyProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probes the closest candidates and returns the one with the lowest
    /// average round trip, in milliseconds.
    pub async fn best(
        &self,
        client: &Client,
        servers: &[Server],
        secure: bool,
    ) -> Result<(Server, f64), ProviderError> {
        let mut best: Option<(&Server, f64)> = None;

        for server in servers.iter().take(CANDIDATES) {
            let latency = match server.endpoint(secure).and_then(|url| latency_url(&url)) {
                Ok(url) => self.measure(client, &url).await,
                Err(err) => {
                    debug!(server = %server.info.label(), %err, "skipping server");
                    continue;
                }
            };
            debug!(server = %server.info.label(), latency_ms = latency, "probed");

            if best.map_or(true, |(_, current)| latency < current) {
                best = Some((server, latency));
            }
        }

        best.map(|(server, latency)| (server.clone(), latency))
            .ok_or(ProviderError::NoServers)
    }

    async fn measure(&self, client: &Client, url: &Url) -> f64 {
        let mut samples = Vec::with_capacity(PROBES_PER_SERVER);

        for attempt in 0..PROBES_PER_SERVER {
            let mut probe_url = url.clone();
            probe_url
                .query_pairs_mut()
                .append_pair("x", &format!("{}.{attempt}", chrono::Utc::now().timestamp_millis()));

            let start = Instant::now();
            let ok = match client.get(probe_url).timeout(self.timeout).send().await {
                Ok(response) if response.status().is_success() => response
                    .text()
                    .await
                    .map(|body| body.trim() == "test=test")
                    .unwrap_or(false),
                _ => false,
            };
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;

            samples.push(if ok { elapsed } else { FAILED_PROBE_MS });
        }

        average_ms(&samples)
    }
}

pub fn latency_url(endpoint: &Url) -> Result<Url, ProviderError> {
    endpoint
        .join("latency.txt")
        .map_err(|e| ProviderError::Malformed(format!("latency url for {endpoint}: {e}")))
}

fn average_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return FAILED_PROBE_MS;
    }
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    (avg * 1000.0).round() / 1000.0
}
