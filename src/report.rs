use chrono::SecondsFormat;
use std::fmt::Write;

use crate::speedtest::MeasurementResult;

pub fn render_report(result: &MeasurementResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Internet speed test results:");
    let _ = writeln!(out, "  Download: {:.2} Mbps", result.download_mbps);
    let _ = writeln!(out, "  Upload:   {:.2} Mbps", result.upload_mbps);
    let _ = writeln!(out, "  Ping:     {} ms", result.ping_ms);
    let _ = writeln!(out, "  Server:   {} via {}", result.server_name, result.sponsor);
    let _ = writeln!(
        out,
        "  Time:     {}",
        result.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    );
    out.push('\n');

    if let Some(url) = &result.share_url {
        let _ = writeln!(out, "Shareable image: {url}");
    }
    out
}
