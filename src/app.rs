use crate::error::SpeedTestError;
use crate::settings::Settings;
use crate::speedtest::normalize::{normalize_timestamp, to_mbps};
use crate::speedtest::provider::{Availability, MeasurementProvider};
use crate::speedtest::{MeasurementResult, TestPhase};
use tracing::{debug, info};

const MISSING_PROVIDER: &str =
    "this build has no measurement provider; rebuild with `--features speedtest-net`";

/// Returns the provider compiled into this binary, if any.
pub fn resolve_provider() -> Option<Box<dyn MeasurementProvider>> {
    #[cfg(feature = "speedtest-net")]
    {
        Some(Box::new(crate::speedtest::net::SpeedtestNet::new()))
    }
    #[cfg(not(feature = "speedtest-net"))]
    {
        None
    }
}

/// Runs one complete measurement. Every step finishes before the next starts,
/// and any provider failure aborts the run without a result.
pub async fn run_speed_test<P>(
    provider: Option<&mut P>,
    settings: &Settings,
) -> Result<MeasurementResult, SpeedTestError>
where
    P: MeasurementProvider + ?Sized,
{
    let provider = provider.ok_or_else(|| SpeedTestError::ProviderUnavailable {
        remediation: MISSING_PROVIDER.to_string(),
    })?;
    if let Availability::Missing { remediation } = provider.probe() {
        return Err(SpeedTestError::ProviderUnavailable { remediation });
    }

    info!(
        secure = settings.secure(),
        timeout_secs = settings.timeout,
        "discovering servers"
    );
    provider
        .discover_servers(settings.secure(), settings.timeout())
        .await
        .map_err(SpeedTestError::measurement(TestPhase::Discovery))?;

    let server = provider
        .select_best_server()
        .await
        .map_err(SpeedTestError::measurement(TestPhase::Selection))?;
    info!(server = %server.label(), sponsor = %server.sponsor_label(), "selected server");

    let download_bps = provider
        .measure_download()
        .await
        .map_err(SpeedTestError::measurement(TestPhase::Download))?;
    debug!(download_bps, "download finished");

    let upload_bps = provider
        .measure_upload()
        .await
        .map_err(SpeedTestError::measurement(TestPhase::Upload))?;
    debug!(upload_bps, "upload finished");

    let share_url = if settings.share {
        provider
            .request_share_reference()
            .await
            .map_err(SpeedTestError::measurement(TestPhase::Share))?
            .filter(|url| !url.is_empty())
    } else {
        None
    };

    let results = provider
        .aggregated_result()
        .map_err(SpeedTestError::measurement(TestPhase::Results))?;

    Ok(MeasurementResult {
        download_mbps: to_mbps(download_bps),
        upload_mbps: to_mbps(upload_bps),
        ping_ms: results.ping,
        timestamp: normalize_timestamp(&results.timestamp)?,
        server_name: results.server.label(),
        sponsor: results.server.sponsor_label(),
        share_url,
    })
}
