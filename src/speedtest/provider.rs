//! Boundary to whatever actually talks to the network.
//!
//! A provider is stateful across one run: servers discovered in
//! [`MeasurementProvider::discover_servers`] feed the selection, the selected
//! server is used by both transfers, and the transfers feed the share request
//! and the aggregated result.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::normalize::RawTimestamp;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sponsor: Option<String>,
}

impl ServerInfo {
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.name.as_deref().unwrap_or("Unknown"),
            self.country.as_deref().unwrap_or("")
        )
    }

    pub fn sponsor_label(&self) -> String {
        self.sponsor.clone().unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub ping: f64,
    pub timestamp: RawTimestamp,
    pub server: ServerInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Missing { remediation: String },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[cfg(feature = "speedtest-net")]
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("no candidate servers were found")]
    NoServers,

    #[error("no server has been selected")]
    NoServerSelected,

    #[error("download and upload have not both been measured")]
    NotMeasured,

    #[error("share request rejected: {0}")]
    ShareRejected(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait MeasurementProvider: Send {
    /// Cheap local check; must not touch the network.
    fn probe(&self) -> Availability;

    async fn discover_servers(&mut self, secure: bool, timeout: Duration) -> Result<(), ProviderError>;

    async fn select_best_server(&mut self) -> Result<ServerInfo, ProviderError>;

    /// Returns bits per second.
    async fn measure_download(&mut self) -> Result<f64, ProviderError>;

    /// Returns bits per second.
    async fn measure_upload(&mut self) -> Result<f64, ProviderError>;

    async fn request_share_reference(&mut self) -> Result<Option<String>, ProviderError>;

    fn aggregated_result(&self) -> Result<AggregatedResult, ProviderError>;
}
