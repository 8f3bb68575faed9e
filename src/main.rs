mod app;
mod error;
mod history;
mod logging;
mod report;
mod settings;
mod speedtest;

use anyhow::{Context, Result};
use clap::Parser;
use history::CsvHistory;
use report::render_report;
use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::parse();
    logging::init_logging(settings.verbose);

    match run(&settings) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let mut provider = app::resolve_provider();
    let result = runtime.block_on(app::run_speed_test(provider.as_deref_mut(), settings))?;

    if let Some(path) = &settings.csv {
        let history = CsvHistory::new(path);
        history
            .append(&result)
            .with_context(|| format!("recording result in {}", history.path().display()))?;
    }

    Ok(render_report(&result))
}
