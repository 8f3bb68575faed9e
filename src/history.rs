//! Append-only CSV log of completed runs.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::speedtest::MeasurementResult;

const HEADER: &str = "timestamp,download_mbps,upload_mbps,ping_ms,server,sponsor,share_url";

pub struct CsvHistory {
    path: PathBuf,
}

impl CsvHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, result: &MeasurementResult) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let is_new = file
            .metadata()
            .with_context(|| format!("inspecting {}", self.path.display()))?
            .len()
            == 0;

        let mut text = String::new();
        if is_new {
            text.push_str(HEADER);
            text.push('\n');
        }
        text.push_str(&csv_row(result));
        text.push('\n');

        file.write_all(text.as_bytes())
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

fn csv_row(result: &MeasurementResult) -> String {
    [
        result.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        format!("{:.2}", result.download_mbps),
        format!("{:.2}", result.upload_mbps),
        result.ping_ms.to_string(),
        escape(&result.server_name),
        escape(&result.sponsor),
        escape(result.share_url.as_deref().unwrap_or("")),
    ]
    .join(",")
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn result(sponsor: &str) -> MeasurementResult {
        MeasurementResult {
            download_mbps: 93.4,
            upload_mbps: 11.0,
            ping_ms: 8.125,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap().fixed_offset(),
            server_name: "Oslo (Norway)".to_string(),
            sponsor: sponsor.to_string(),
            share_url: None,
        }
    }

    #[test]
    fn header_written_once() {
        let dir = tempdir().unwrap();
        let history = CsvHistory::new(dir.path().join("runs.csv"));

        history.append(&result("Telia")).unwrap();
        history.append(&result("Telia")).unwrap();

        let text = std::fs::read_to_string(history.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "2024-06-30T12:00:00+00:00,93.40,11.00,8.125,Oslo (Norway),Telia,"
        );
    }

    #[test]
    fn empty_existing_file_gets_a_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        std::fs::File::create(&path).unwrap();

        CsvHistory::new(&path).append(&result("Telia")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some(HEADER));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn awkward_fields_are_quoted() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("Acme, Inc."), "\"Acme, Inc.\"");
        assert_eq!(escape("the \"best\" isp"), "\"the \"\"best\"\" isp\"");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let history = CsvHistory::new(dir.path().join("nope").join("runs.csv"));
        assert!(history.append(&result("Telia")).is_err());
    }
}
