use thiserror::Error;

use crate::speedtest::provider::ProviderError;
use crate::speedtest::TestPhase;

#[derive(Debug, Error)]
pub enum SpeedTestError {
    #[error("measurement provider unavailable: {remediation}")]
    ProviderUnavailable { remediation: String },

    #[error("{phase} failed")]
    MeasurementFailed {
        phase: TestPhase,
        #[source]
        source: ProviderError,
    },

    #[error("provider returned an unrecognised timestamp: {0}")]
    InvalidTimestamp(String),
}

impl SpeedTestError {
    pub fn measurement(phase: TestPhase) -> impl FnOnce(ProviderError) -> Self {
        move |source| SpeedTestError::MeasurementFailed { phase, source }
    }
}
