#[cfg(feature = "speedtest-net")]
pub mod net;
pub mod normalize;
pub mod provider;

use std::fmt;

use chrono::{DateTime, FixedOffset};

/// Outcome of one completed test run. Built once by the orchestrator and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    /// Latency exactly as the provider reported it.
    pub ping_ms: f64,
    pub timestamp: DateTime<FixedOffset>,
    pub server_name: String,
    pub sponsor: String,
    pub share_url: Option<String>,
}

/// Steps of a run, in the order they execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Discovery,
    Selection,
    Download,
    Upload,
    Share,
    Results,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestPhase::Discovery => "server discovery",
            TestPhase::Selection => "server selection",
            TestPhase::Download => "download measurement",
            TestPhase::Upload => "upload measurement",
            TestPhase::Share => "share request",
            TestPhase::Results => "result collection",
        };
        f.write_str(label)
    }
}
